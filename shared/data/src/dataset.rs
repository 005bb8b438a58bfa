use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One labelled sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub features: Vec<f32>,
    pub label: usize,
}

/// An in-memory dataset, either a full split or one client's shard.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    examples: Vec<Example>,
    num_features: usize,
    num_classes: usize,
}

impl Dataset {
    pub fn new(examples: Vec<Example>, num_features: usize, num_classes: usize) -> Self {
        debug_assert!(examples
            .iter()
            .all(|ex| ex.features.len() == num_features && ex.label < num_classes));
        Self {
            examples,
            num_features,
            num_classes,
        }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Mini-batch views over the examples. The final batch may be short.
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = &[Example]> {
        assert!(batch_size > 0, "batch size must be non-zero");
        self.examples.chunks(batch_size)
    }

    /// Split into `num_clients` IID shards: shuffle once, then cut into
    /// near-equal contiguous pieces. Every example lands in exactly one
    /// shard and shard sizes differ by at most one.
    pub fn partition_iid(&self, num_clients: usize, rng: &mut ChaCha8Rng) -> Vec<Dataset> {
        assert!(num_clients > 0, "cannot partition across zero clients");

        let mut shuffled = self.examples.clone();
        shuffled.shuffle(rng);

        let base = shuffled.len() / num_clients;
        let remainder = shuffled.len() % num_clients;

        let mut shards = Vec::with_capacity(num_clients);
        let mut rest = shuffled.as_slice();
        for i in 0..num_clients {
            let take = base + usize::from(i < remainder);
            let (shard, tail) = rest.split_at(take);
            shards.push(Dataset::new(
                shard.to_vec(),
                self.num_features,
                self.num_classes,
            ));
            rest = tail;
        }
        shards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedsim_core::seeded_rng;
    use pretty_assertions::assert_eq;

    fn dataset(n: usize) -> Dataset {
        let examples = (0..n)
            .map(|i| Example {
                features: vec![i as f32, (n - i) as f32],
                label: i % 2,
            })
            .collect();
        Dataset::new(examples, 2, 2)
    }

    #[test]
    fn iid_partition_covers_every_example_once() {
        let data = dataset(103);
        let shards = data.partition_iid(10, &mut seeded_rng(0));

        assert_eq!(shards.len(), 10);
        assert_eq!(shards.iter().map(Dataset::len).sum::<usize>(), 103);

        let min = shards.iter().map(Dataset::len).min().unwrap();
        let max = shards.iter().map(Dataset::len).max().unwrap();
        assert!(max - min <= 1);

        let mut seen: Vec<f32> = shards
            .iter()
            .flat_map(|s| s.examples().iter().map(|ex| ex.features[0]))
            .collect();
        seen.sort_by(f32::total_cmp);
        let expected: Vec<f32> = (0..103).map(|i| i as f32).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn partition_is_deterministic_per_seed() {
        let data = dataset(40);
        let a = data.partition_iid(4, &mut seeded_rng(7));
        let b = data.partition_iid(4, &mut seeded_rng(7));
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.examples(), y.examples());
        }
    }

    #[test]
    fn short_final_batch() {
        let data = dataset(10);
        let sizes: Vec<usize> = data.batches(4).map(<[Example]>::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }
}
