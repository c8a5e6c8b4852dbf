mod tests_catalog;
