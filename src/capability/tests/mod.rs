mod tests_probe;
