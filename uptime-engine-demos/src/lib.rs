//! Demos for `uptime-engine`, run with `cargo run -p uptime-engine-demos --example <name>`.
