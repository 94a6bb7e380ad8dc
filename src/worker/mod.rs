//! Pool for the data-parallel inner loops of the prover.
//!
//! Work is always split into equal contiguous row ranges and results are written back
//! by range, so the output never depends on the number of threads.
use rayon::{ThreadPool, ThreadPoolBuilder};

pub struct Worker {
    pool: ThreadPool,
    pub num_cores: usize,
}

// Stack size differs between debug/release builds, so we fix it
pub const REQUIRED_STACK_SIZE: usize = 8 * 1024 * 1024;

impl Worker {
    pub fn new() -> Self {
        Self::new_with_num_threads(num_cpus::get_physical())
    }

    pub fn new_with_num_threads(num_threads: usize) -> Self {
        let num_threads = std::cmp::max(num_threads, 1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .stack_size(REQUIRED_STACK_SIZE)
            .build()
            .expect("failed to build thread pool");

        Self {
            pool,
            num_cores: num_threads,
        }
    }

    pub const fn compute_chunk_size(work_size: usize, num_chunks: usize) -> usize {
        if work_size <= num_chunks {
            1
        } else {
            let mut chunk_size = work_size / num_chunks;
            if work_size % num_chunks != 0 {
                chunk_size += 1;
            }

            chunk_size
        }
    }

    pub const fn get_chunk_size(&self, work_size: usize) -> usize {
        Self::compute_chunk_size(work_size, self.num_cores)
    }

    pub fn scope<'a, F, R>(&self, work_size: usize, f: F) -> R
    where
        F: FnOnce(&rayon::Scope<'a>, usize) -> R,
    {
        let chunk_size = self.get_chunk_size(work_size);

        self.pool.in_place_scope(|scope| f(scope, chunk_size))
    }

    /// Computes `f(i)` for every `i` in `0..size`, in parallel over row ranges.
    pub fn map_indexes<T, F>(&self, size: usize, f: F) -> Vec<T>
    where
        T: Send + Clone + Default,
        F: Fn(usize) -> T + Send + Sync,
    {
        let mut result = vec![T::default(); size];
        if size == 0 {
            return result;
        }
        let f = &f;
        self.scope(size, |scope, chunk_size| {
            for (chunk_idx, dst) in result.chunks_mut(chunk_size).enumerate() {
                scope.spawn(move |_| {
                    let offset = chunk_idx * chunk_size;
                    for (i, el) in dst.iter_mut().enumerate() {
                        *el = f(offset + i);
                    }
                });
            }
        });

        result
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_map_indexes_is_independent_of_thread_count() {
        let single = Worker::new_with_num_threads(1);
        let many = Worker::new_with_num_threads(5);
        let a = single.map_indexes(1003, |i| (i * i) as u64);
        let b = many.map_indexes(1003, |i| (i * i) as u64);
        assert_eq!(a, b);
        assert_eq!(a[1002], 1002 * 1002);
    }
}
