//! Stack growth for the recursive parser and evaluator.
//!
//! Generated code can recurse (a naive `fib`) and nest expressions deeply;
//! both map onto Rust recursion. Callers wrap recursive entry points in
//! [`ensure_sufficient_stack`] so the interpreter's own depth limit, not the
//! thread's stack size, is what stops a runaway program.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
