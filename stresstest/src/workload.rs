use std::io;
use std::thread::available_parallelism;

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::weighted::WeightedIndex;
use rand_distr::{Distribution, LogNormal, Zipf};

pub type UserId = u64;

pub struct WorkloadBuilder {
    name: &'static str,
    concurrency: usize,
    seed: u64,

    p50_size: u64,
    p99_size: u64,

    write_weight: u8,
    overwrite_weight: u8,
    read_weight: u8,
}

impl WorkloadBuilder {
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn size_distribution(mut self, p50: u64, p99: u64) -> Self {
        self.p50_size = p50;
        self.p99_size = p99;
        self
    }

    pub fn action_weights(mut self, writes: u8, overwrites: u8, reads: u8) -> Self {
        self.write_weight = writes;
        self.overwrite_weight = overwrites;
        self.read_weight = reads;
        self
    }

    pub fn build(self) -> Workload {
        let rng = SmallRng::seed_from_u64(self.seed);

        // Inspired by <https://stats.stackexchange.com/a/649432>
        let p50 = self.p50_size as f64;
        let p99 = self.p99_size as f64;
        let mu = p50.ln();
        let sigma = (p99.ln() - mu) / 2.3263;

        let size_distribution = LogNormal::new(mu, sigma).unwrap();
        let action_distribution =
            WeightedIndex::new([self.write_weight, self.overwrite_weight, self.read_weight])
                .unwrap();

        Workload {
            name: self.name,
            concurrency: self.concurrency,
            p50_size: self.p50_size,
            p99_size: self.p99_size,

            rng,
            size_distribution,
            action_distribution,

            next_user_id: 1,
            existing_photos: Default::default(),
        }
    }
}

pub struct Workload {
    pub name: &'static str,
    pub concurrency: usize,
    pub p50_size: u64,
    pub p99_size: u64,

    /// The RNG driving all our distributions.
    rng: SmallRng,
    /// A distribution that generates payload sizes for write actions.
    size_distribution: LogNormal<f64>,
    /// A distribution that generates actions, such as write/overwrite/read.
    action_distribution: WeightedIndex<u8>,

    next_user_id: UserId,
    /// All uploaded photos, as `(user, payload seed)`, available for
    /// readback or overwrite.
    existing_photos: Vec<(UserId, u64)>,
}

impl Workload {
    pub fn builder(name: &'static str) -> WorkloadBuilder {
        WorkloadBuilder {
            name,
            concurrency: available_parallelism().unwrap().get(),
            seed: rand::random(),

            p50_size: 16 * 1024,
            p99_size: 1024 * 1024,

            write_weight: 49,
            overwrite_weight: 2,
            read_weight: 49,
        }
    }

    fn get_payload(&self, seed: u64) -> Payload {
        let mut rng = SmallRng::seed_from_u64(seed);
        let len = self.size_distribution.sample(&mut rng) as u64;

        Payload { len, rng }
    }

    fn sample_readback(&mut self) -> Option<(UserId, u64)> {
        if self.existing_photos.is_empty() {
            return None;
        }
        let len = self.existing_photos.len();
        let zipf = Zipf::new(len as f64, 2.0).unwrap();
        let idx = len - self.rng.sample(zipf) as usize;

        Some(self.existing_photos.remove(idx))
    }

    pub fn next_action(&mut self) -> Action {
        loop {
            match self.action_distribution.sample(&mut self.rng) {
                0 => {
                    let user = self.next_user_id;
                    self.next_user_id += 1;

                    let seed = self.rng.next_u64();
                    return Action::Write(user, seed, self.get_payload(seed));
                }
                1 => {
                    let Some((user, _old_seed)) = self.sample_readback() else {
                        continue;
                    };
                    let seed = self.rng.next_u64();
                    return Action::Write(user, seed, self.get_payload(seed));
                }
                _ => {
                    let Some((user, seed)) = self.sample_readback() else {
                        continue;
                    };
                    return Action::Read(user, seed, self.get_payload(seed));
                }
            }
        }
    }

    /// Registers a photo, so it can be yielded for reads or overwrites.
    ///
    /// This has to be called when a write or read has completed. Photos
    /// currently being read will not be concurrently overwritten, as
    /// `next_action` removes them from the pool.
    pub fn push_photo(&mut self, user: UserId, seed: u64) {
        self.existing_photos.push((user, seed))
    }
}

pub enum Action {
    /// Upload a payload derived from the given seed for the given user.
    /// Covers both first writes and overwrites of an existing photo.
    Write(UserId, u64, Payload),
    /// Read back the photo of the given user and verify it against the
    /// payload derived from the seed.
    Read(UserId, u64, Payload),
}

pub struct Payload {
    pub len: u64,
    pub rng: SmallRng,
}

impl io::Read for Payload {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len_to_fill = (buf.len() as u64).min(self.len) as usize;

        let fill_buf = &mut buf[..len_to_fill];
        self.rng.fill_bytes(fill_buf);

        self.len -= len_to_fill as u64;
        Ok(len_to_fill)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn payloads_are_deterministic() {
        let workload = Workload::builder("test")
            .size_distribution(100, 1000)
            .build();

        let mut first = Vec::new();
        workload.get_payload(42).read_to_end(&mut first).unwrap();
        let mut second = Vec::new();
        workload.get_payload(42).read_to_end(&mut second).unwrap();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
