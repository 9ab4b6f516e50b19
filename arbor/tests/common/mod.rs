#![allow(dead_code)]

use std::sync::Once;

use arbor::{Node, Tree};
use simplelog::{Config, LevelFilter, TestLogger};

static INIT: Once = Once::new();

/// Route library logs to the test harness output.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = TestLogger::init(LevelFilter::Debug, Config::default());
    });
}

/// `count` root siblings with ids `s1..=sN`.
pub fn siblings(count: usize) -> Tree<usize> {
    Tree::new(
        (1..=count)
            .map(|i| Node::new(format!("s{i}"), format!("sibling {i}"), i))
            .collect(),
    )
}

