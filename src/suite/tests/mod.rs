pub mod helpers;
mod tests_faulty;
mod tests_point_ops;
mod tests_snapshot;
