mod discover_tests;
mod merge_tests;
