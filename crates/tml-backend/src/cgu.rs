//! Parallel compilation-group compilation.
//!
//! Each group's IR compiles on its own worker with its own backend context;
//! backend global state is never shared across threads. Workers write to
//! distinct output paths, so completion order cannot affect the final
//! binary.

use std::path::PathBuf;

use rayon::prelude::*;

use crate::llvm::{compile_ir_to_object, CompileOptions};

/// One compilation group: a name and its IR text.
#[derive(Debug, Clone)]
pub struct CompilationGroup {
    pub name: String,
    pub ir: String,
}

/// Compile every group, `num_threads` at a time. Returns the object paths
/// in group order.
pub fn compile_groups(
    groups: &[CompilationGroup],
    out_dir: &std::path::Path,
    options: &CompileOptions,
    num_threads: usize,
) -> Result<Vec<PathBuf>, String> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("cannot create {}: {e}", out_dir.display()))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()
        .map_err(|e| format!("worker pool: {e}"))?;

    let results: Vec<Result<PathBuf, String>> = pool.install(|| {
        groups
            .par_iter()
            .map(|group| {
                let out = out_dir.join(format!("{}.o", group.name));
                compile_ir_to_object(&group.ir, &out, options)?;
                Ok(out)
            })
            .collect()
    });

    results.into_iter().collect()
}

/// Split functions into `count` groups round-robin. The split is stable:
/// the same input produces the same grouping.
pub fn partition<T: Clone>(items: &[T], count: usize) -> Vec<Vec<T>> {
    let count = count.clamp(1, items.len().max(1));
    let mut groups = vec![Vec::new(); count];
    for (index, item) in items.iter().enumerate() {
        groups[index % count].push(item.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_is_stable_and_covers_everything() {
        let items: Vec<u32> = (0..10).collect();
        let a = partition(&items, 4);
        let b = partition(&items, 4);
        assert_eq!(a, b);
        let total: usize = a.iter().map(Vec::len).sum();
        assert_eq!(total, 10);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn partition_never_exceeds_item_count() {
        let items = vec![1, 2];
        let groups = partition(&items, 8);
        assert_eq!(groups.len(), 2);
    }
}
