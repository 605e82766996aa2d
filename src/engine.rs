//! Execution engines and the partitioned collection they drive.
//!
//! An [`Engine`] knows how to run one closure over every partition of a
//! partitioned data set, nothing more. [`Collection`] builds the usual
//! map/reduce vocabulary (`map`, `reduce_by_key`, `sort_by_key`, `collect`) on
//! top of that single primitive, so swapping the engine changes where the work
//! runs without touching the dataflow.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;

pub trait Engine: Sync {
    fn name(&self) -> &'static str;

    /// Runs `f` on every partition and returns the outputs in partition order.
    /// The partition index is passed along with its contents.
    fn run_partitions<T, U, F>(&self, partitions: Vec<Vec<T>>, f: F) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(usize, Vec<T>) -> U + Sync + Send;
}

/// Runs every partition on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Engine for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn run_partitions<T, U, F>(&self, partitions: Vec<Vec<T>>, f: F) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(usize, Vec<T>) -> U + Sync + Send,
    {
        partitions
            .into_iter()
            .enumerate()
            .map(|(i, part)| f(i, part))
            .collect()
    }
}

/// Runs partitions as tasks on a dedicated rayon pool.
///
/// Each instance owns its pool, so independent callers never contend for a
/// shared global runtime.
pub struct Threaded {
    pool: ThreadPool,
}

impl Threaded {
    /// A pool with `threads` workers; `0` lets rayon pick from the CPU count.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("spmv-worker-{i}"))
            .build()?;
        debug!("threaded engine with {} workers", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Engine for Threaded {
    fn name(&self) -> &'static str {
        "threaded"
    }

    fn run_partitions<T, U, F>(&self, partitions: Vec<Vec<T>>, f: F) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(usize, Vec<T>) -> U + Sync + Send,
    {
        self.pool.install(|| {
            partitions
                .into_par_iter()
                .enumerate()
                .map(|(i, part)| f(i, part))
                .collect()
        })
    }
}

/// A data set split into partitions and bound to the engine that processes it.
pub struct Collection<'e, E: Engine, T> {
    engine: &'e E,
    partitions: Vec<Vec<T>>,
}

/// Splits `data` into `n` contiguous chunks whose sizes differ by at most one.
fn split_even<T>(mut data: Vec<T>, n: usize) -> Vec<Vec<T>> {
    let n = n.max(1);
    let base = data.len() / n;
    let extra = data.len() % n;
    let mut parts = Vec::with_capacity(n);
    // peel chunks off the back so `split_off` never shifts elements
    for i in (0..n).rev() {
        let size = base + usize::from(i < extra);
        let at = data.len() - size;
        parts.push(data.split_off(at));
    }
    parts.reverse();
    parts
}

impl<'e, E: Engine, T: Send> Collection<'e, E, T> {
    /// Distributes local data over `partitions` partitions (at least one).
    pub fn parallelize(engine: &'e E, data: Vec<T>, partitions: usize) -> Self {
        let partitions = split_even(data, partitions);
        trace!(
            "{} engine: parallelized into {} partitions",
            engine.name(),
            partitions.len()
        );
        Self { engine, partitions }
    }

    pub fn engine(&self) -> &'e E {
        self.engine
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn count(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    pub fn map<U, F>(self, f: F) -> Collection<'e, E, U>
    where
        U: Send,
        F: Fn(T) -> U + Sync + Send,
    {
        let partitions = self
            .engine
            .run_partitions(self.partitions, |_, part| part.into_iter().map(&f).collect());
        Collection {
            engine: self.engine,
            partitions,
        }
    }

    /// Like [`Collection::map`] but `f` may fail. A single failure anywhere
    /// fails the whole collection; partial results are dropped.
    pub fn try_map<U, F>(self, f: F) -> Result<Collection<'e, E, U>>
    where
        U: Send,
        F: Fn(T) -> Result<U> + Sync + Send,
    {
        let outputs = self.engine.run_partitions(self.partitions, |_, part| {
            part.into_iter().map(&f).collect::<Result<Vec<U>>>()
        });
        let partitions = outputs.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(Collection {
            engine: self.engine,
            partitions,
        })
    }

    /// Keeps the `Some` outputs of `f` and drops the rest.
    pub fn filter_map<U, F>(self, f: F) -> Collection<'e, E, U>
    where
        U: Send,
        F: Fn(T) -> Option<U> + Sync + Send,
    {
        let partitions = self.engine.run_partitions(self.partitions, |_, part| {
            part.into_iter().filter_map(&f).collect()
        });
        Collection {
            engine: self.engine,
            partitions,
        }
    }

    /// Materialises the collection locally, partition by partition.
    pub fn collect(self) -> Vec<T> {
        self.partitions.into_iter().flatten().collect()
    }
}

fn bucket_of<K: Hash>(key: &K, buckets: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % buckets as u64) as usize
}

fn combine_into<K, V, F>(acc: &mut HashMap<K, V>, pairs: impl IntoIterator<Item = (K, V)>, f: &F)
where
    K: Hash + Eq,
    F: Fn(V, V) -> V,
{
    for (key, value) in pairs {
        let merged = match acc.remove(&key) {
            Some(prev) => f(prev, value),
            None => value,
        };
        acc.insert(key, merged);
    }
}

impl<'e, E, K, V> Collection<'e, E, (K, V)>
where
    E: Engine,
    K: Hash + Eq + Send,
    V: Send,
{
    /// Combines all values sharing a key with `f`, which must be associative
    /// and commutative: partial results are merged in no particular order.
    ///
    /// Values are first combined inside each partition, then shuffled by key
    /// hash so that every key lands in exactly one output partition, where the
    /// partial results are combined again.
    pub fn reduce_by_key<F>(self, f: F) -> Self
    where
        F: Fn(V, V) -> V + Sync + Send,
    {
        let n = self.partitions.len().max(1);

        let buckets: Vec<Vec<Vec<(K, V)>>> =
            self.engine.run_partitions(self.partitions, |_, part| {
                let mut acc = HashMap::new();
                combine_into(&mut acc, part, &f);
                let mut out: Vec<Vec<(K, V)>> = (0..n).map(|_| Vec::new()).collect();
                for (key, value) in acc {
                    out[bucket_of(&key, n)].push((key, value));
                }
                out
            });

        let mut shuffled: Vec<Vec<(K, V)>> = (0..n).map(|_| Vec::new()).collect();
        for out in buckets {
            for (target, pairs) in shuffled.iter_mut().zip(out) {
                target.extend(pairs);
            }
        }
        trace!(
            "shuffled {} partial results into {} partitions",
            shuffled.iter().map(Vec::len).sum::<usize>(),
            n
        );

        let partitions = self.engine.run_partitions(shuffled, |_, part| {
            let mut acc = HashMap::new();
            combine_into(&mut acc, part, &f);
            acc.into_iter().collect()
        });

        Self {
            engine: self.engine,
            partitions,
        }
    }

    /// Orders the collection by key. Partition `i` ends up holding a
    /// contiguous key range preceding that of partition `i + 1`.
    pub fn sort_by_key(self) -> Self
    where
        K: Ord,
    {
        let n = self.partitions.len();
        let mut sorted: Vec<Vec<(K, V)>> = self.engine.run_partitions(self.partitions, |_, mut part| {
            part.sort_by(|a, b| a.0.cmp(&b.0));
            part
        });

        let mut all: Vec<(K, V)> = Vec::with_capacity(sorted.iter().map(Vec::len).sum());
        for part in sorted.iter_mut() {
            all.append(part);
        }
        // stable, so equal keys keep their partition order
        all.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            engine: self.engine,
            partitions: split_even(all, n),
        }
    }
}
