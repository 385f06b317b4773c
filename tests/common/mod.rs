use std::sync::Once;

use sqlweave::{parse, Statement};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[allow(dead_code)]
pub fn parsed(sql: &str) -> Statement {
    init_tracing();
    parse(sql).expect("parse failed")
}
