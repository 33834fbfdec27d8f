//! Own test binary: closes the process-wide standard input while it runs.

use std::fs;

use dispatchsh::Dispatcher;
use nix::{libc, unistd};

fn words(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[test]
fn pipe_read_end_landing_on_stdin_number_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("cat.txt");
    let script = format!("cat > {}", target.to_str().unwrap());
    let dispatcher = Dispatcher::new();

    // With fd 0 free, the pipe's read end is allocated as fd 0 itself.
    let saved = unistd::dup(libc::STDIN_FILENO).ok();
    if saved.is_some() {
        unistd::close(libc::STDIN_FILENO).unwrap();
    }
    let result = dispatcher.dispatch(words(&["echo", "hi", "|", "sh", "-c", &script]));
    if let Some(fd) = saved {
        unistd::dup2(fd, libc::STDIN_FILENO).unwrap();
        unistd::close(fd).unwrap();
    }

    let outcome = result.unwrap();
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(fs::read_to_string(&target).unwrap(), "hi\n");
}
