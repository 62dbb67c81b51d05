// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination

/// Corpus → vocabulary → embedding matrix → training loop
pub mod train_use_case;

/// Checkpoint → held-out predictions → report
pub mod evaluate_use_case;

/// Run a whole-pipeline test on a thread with room for the
/// unoptimised model's forward and backward frames.
#[cfg(test)]
pub(crate) fn with_large_stack<F: FnOnce() + Send + 'static>(f: F) {
    let handle = std::thread::Builder::new()
        .stack_size(8 << 20)
        .spawn(f)
        .unwrap();
    if let Err(panic) = handle.join() {
        std::panic::resume_unwind(panic);
    }
}
