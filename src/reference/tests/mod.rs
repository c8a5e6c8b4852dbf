mod tests_hashed;
