//! Runs deeply recursive work (parsing, interpretation) on a dedicated
//! thread with an explicit stack size.

use std::io;
use std::thread;

pub fn run_with_stack<T, F>(stack_size: usize, f: F) -> io::Result<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("fnlab-worker".to_string())
            .stack_size(stack_size)
            .spawn_scoped(scope, f)?;
        handle
            .join()
            .map_err(|_| io::Error::other("worker thread panicked"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: u64) -> u64 {
        let padding = [n; 64];
        if n == 0 {
            padding[0]
        } else {
            depth(n - 1) + std::hint::black_box(padding)[1] - n + 1
        }
    }

    #[test]
    fn test_deep_recursion_on_large_stack() {
        let result = run_with_stack(256 * 1024 * 1024, || depth(100_000)).unwrap();
        assert_eq!(result, 100_000);
    }

    #[test]
    fn test_panic_is_reported() {
        let result = run_with_stack(1024 * 1024, || -> u32 { panic!("boom") });
        assert!(result.is_err());
    }
}
