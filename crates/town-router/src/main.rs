//! `townd`: reads framed messages from stdin, writes framed replies to
//! stdout, and routes everything through [`town_router::Router`].

use std::io::stdout;
use std::sync::Arc;

use town_engine::ReferenceEngine;
use town_router::{pipe_outbox, Router};

fn main() {
    let outbox = pipe_outbox(stdout());
    let mut router = Router::new(outbox, Arc::new(ReferenceEngine));

    let stdin = std::io::stdin();
    let mut lock = stdin.lock();
    if let Err(e) = router.run(&mut lock) {
        eprintln!("townd: {e}");
        std::process::exit(1);
    }
}
