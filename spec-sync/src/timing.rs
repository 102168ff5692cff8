//! Operation timing
//!
//! `measure_time!` wraps a block, logs its duration through `tracing`, and
//! yields the block's value.
//!
//! ```
//! use speckit_sync::measure_time;
//!
//! let total = measure_time!("sum_ids", { (1..=3).sum::<u32>() });
//! assert_eq!(total, 6);
//! ```

/// Measure execution time of a synchronous block
///
/// Logs via `tracing::info!` with fields:
/// - `operation`: The operation label
/// - `elapsed_ms`: Elapsed time in milliseconds
#[macro_export]
macro_rules! measure_time {
    ($label:expr, $block:block) => {{
        let __start = std::time::Instant::now();
        let __result = $block;
        let __elapsed = __start.elapsed();
        ::tracing::info!(
            operation = $label,
            elapsed_ms = __elapsed.as_millis() as u64,
            "Operation completed"
        );
        __result
    }};
}
