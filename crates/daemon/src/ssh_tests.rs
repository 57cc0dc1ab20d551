use super::*;
use std::time::Duration;

/// Points `ssh_binary` at a stand-in script so the test never needs a real
/// SSH server or network access.
fn fallback_with_script(script: &str) -> SshFallback {
    SshFallback {
        ssh_binary: script.to_string(),
        extra_args: Vec::new(),
    }
}

#[tokio::test]
async fn a_successful_command_returns_trimmed_stdout() {
    let fallback = fallback_with_script("/bin/echo");
    let result = fallback
        .execute(&ServerId::new("host-1"), "hello", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(result, "host-1 hello");
}

#[tokio::test]
async fn a_nonzero_exit_surfaces_stderr() {
    let fallback = fallback_with_script("/bin/false");
    let result = fallback
        .execute(&ServerId::new("host-1"), "whatever", Duration::from_secs(1))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn an_unspawnable_binary_is_an_error() {
    let fallback = fallback_with_script("/nonexistent/binary/path");
    let result = fallback
        .execute(&ServerId::new("host-1"), "whatever", Duration::from_secs(1))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn a_slow_command_times_out() {
    let fallback = fallback_with_script("/bin/sleep");
    // `/bin/sleep <server_id> <command>`: GNU sleep sums multiple operands,
    // so this sleeps five seconds against a fifty millisecond timeout.
    let result = fallback
        .execute(&ServerId::new("5"), "1", Duration::from_millis(50))
        .await;
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("timed out"));
}
