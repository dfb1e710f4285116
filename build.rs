fn main() {
    // Resource-driven tests are generated at compile time, so new test
    // programs must trigger a rebuild.
    build_deps::rerun_if_changed_paths("res/**/*.json").unwrap();
    build_deps::rerun_if_changed_paths("res/**").unwrap();
}
