use derivative::Derivative;

use super::TreeHasher;
use crate::field::SmallField;
use crate::log;
use crate::worker::Worker;

/// Merkle tree that is only committed up to `cap_size` roots.
#[derive(Derivative)]
#[derivative(Clone, Debug)]
pub struct MerkleTreeWithCap<F: SmallField, H: TreeHasher<F>> {
    pub cap_size: usize,
    pub leaf_hashes: Vec<H::Output>,
    pub node_hashes_enumerated_from_leafs: Vec<Vec<H::Output>>,
    #[derivative(Debug = "ignore")]
    _marker: std::marker::PhantomData<F>,
}

impl<F: SmallField, H: TreeHasher<F>> MerkleTreeWithCap<F, H> {
    /// Leaf `i` hashes `elements_to_take_per_leaf` consecutive elements starting at
    /// `i * elements_to_take_per_leaf` from every source, sources in order.
    /// Requested cap size is clamped by the number of leafs.
    pub fn construct_by_chunking_from_flat_sources(
        leafs_sources: &[&[F]],
        elements_to_take_per_leaf: usize,
        cap_size: usize,
        worker: &Worker,
    ) -> Self {
        debug_assert!(cap_size > 0);
        debug_assert!(cap_size.is_power_of_two());
        debug_assert!(elements_to_take_per_leaf.is_power_of_two());
        debug_assert!(leafs_sources.is_empty() == false);

        crate::profile_fn!(merkle_tree_construct);

        let now = std::time::Instant::now();

        let poly_size = leafs_sources[0].len();
        debug_assert!(leafs_sources.iter().all(|el| el.len() == poly_size));
        assert!(poly_size % elements_to_take_per_leaf == 0);
        let tree_size = poly_size / elements_to_take_per_leaf;

        debug_assert!(tree_size.is_power_of_two());
        let cap_size = std::cmp::min(cap_size, tree_size);
        let tree_depth = tree_size.trailing_zeros();
        let layers_to_skip = cap_size.trailing_zeros();

        let leaf_hashes = worker.map_indexes(tree_size, |leaf_idx| {
            let start = leaf_idx * elements_to_take_per_leaf;
            let end = start + elements_to_take_per_leaf;
            H::hash_into_leaf(leafs_sources.iter().flat_map(|src| src[start..end].iter()))
        });

        log!(
            "Merkle tree of size 2^{} leaf hashes taken {:?}",
            tree_size.trailing_zeros(),
            now.elapsed()
        );

        let num_layers_to_construct = tree_depth - layers_to_skip;

        Self::continue_from_leaf_hashes(leaf_hashes, num_layers_to_construct, cap_size, worker)
    }

    fn continue_from_leaf_hashes(
        leaf_hashes: Vec<H::Output>,
        num_layers_to_construct: u32,
        cap_size: usize,
        worker: &Worker,
    ) -> Self {
        let mut node_hashes_enumerated_from_leafs: Vec<Vec<H::Output>> =
            Vec::with_capacity(num_layers_to_construct as usize);
        for _ in 0..num_layers_to_construct {
            let previous = node_hashes_enumerated_from_leafs
                .last()
                .unwrap_or(&leaf_hashes);
            let next_layer_len = previous.len() / 2;
            debug_assert!(next_layer_len > 0);
            let new_layer_node_hashes = worker.map_indexes(next_layer_len, |idx| {
                H::hash_into_node(&previous[2 * idx], &previous[2 * idx + 1])
            });

            node_hashes_enumerated_from_leafs.push(new_layer_node_hashes);
        }

        debug_assert_eq!(
            node_hashes_enumerated_from_leafs
                .last()
                .unwrap_or(&leaf_hashes)
                .len(),
            cap_size
        );

        Self {
            cap_size,
            leaf_hashes,
            node_hashes_enumerated_from_leafs,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn get_cap(&self) -> Vec<H::Output> {
        if let Some(cap) = self.node_hashes_enumerated_from_leafs.last() {
            cap.clone()
        } else {
            self.leaf_hashes.clone()
        }
    }

    pub fn num_leafs(&self) -> usize {
        self.leaf_hashes.len()
    }

    pub fn get_proof(&self, idx: usize) -> (H::Output, Vec<H::Output>) {
        let depth = self.node_hashes_enumerated_from_leafs.len(); // we do not need the element of the cap
        let mut result = Vec::with_capacity(depth);
        let mut idx = idx;
        let this_el_leaf_hash = self.leaf_hashes[idx];
        for i in 0..depth {
            let pair_idx = idx ^ 1;
            let proof_element = if i == 0 {
                self.leaf_hashes[pair_idx]
            } else {
                self.node_hashes_enumerated_from_leafs[i - 1][pair_idx]
            };

            result.push(proof_element);
            idx >>= 1;
        }

        (this_el_leaf_hash, result)
    }

    pub fn verify_proof_over_cap(
        proof: &[H::Output],
        cap: &[H::Output],
        leaf_hash: H::Output,
        idx: usize,
    ) -> bool {
        let mut idx = idx;
        let mut current = leaf_hash;
        for proof_el in proof.iter() {
            if idx & 1 == 0 {
                current = H::hash_into_node(&current, proof_el);
            } else {
                current = H::hash_into_node(proof_el, &current);
            }

            idx >>= 1;
        }

        match cap.get(idx) {
            Some(cap_el) => cap_el == &current,
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::goldilocks::GoldilocksField;
    use crate::field::{rand_from_rng, Field};

    type F = GoldilocksField;
    type H = blake2::Blake2s256;

    #[test]
    fn test_merkle_tree_proofs() {
        let worker = Worker::new_with_num_threads(3);
        let mut rng = rand::thread_rng();
        let a: Vec<F> = (0..64).map(|_| rand_from_rng(&mut rng)).collect();
        let b: Vec<F> = (0..64).map(|_| rand_from_rng(&mut rng)).collect();
        let tree = MerkleTreeWithCap::<F, H>::construct_by_chunking_from_flat_sources(
            &[&a[..], &b[..]],
            2,
            4,
            &worker,
        );
        assert_eq!(tree.num_leafs(), 32);
        let cap = tree.get_cap();
        assert_eq!(cap.len(), 4);

        for idx in [0usize, 7, 19, 31] {
            let (leaf_hash, proof) = tree.get_proof(idx);
            let expected = <H as TreeHasher<F>>::hash_into_leaf(
                a[2 * idx..2 * idx + 2]
                    .iter()
                    .chain(b[2 * idx..2 * idx + 2].iter()),
            );
            assert_eq!(leaf_hash, expected);
            assert!(MerkleTreeWithCap::<F, H>::verify_proof_over_cap(
                &proof, &cap, leaf_hash, idx
            ));
            assert!(
                MerkleTreeWithCap::<F, H>::verify_proof_over_cap(&proof, &cap, leaf_hash, idx ^ 1)
                    == false
            );
        }

        let mut tampered = a.clone();
        tampered[5].add_assign(&F::ONE);
        let other = MerkleTreeWithCap::<F, H>::construct_by_chunking_from_flat_sources(
            &[&tampered[..], &b[..]],
            2,
            4,
            &worker,
        );
        assert_ne!(other.get_cap(), cap);
    }

    #[test]
    fn test_cap_is_clamped() {
        let worker = Worker::new_with_num_threads(1);
        let a: Vec<F> = (0..8).map(|i| F::from_u64_with_reduction(i)).collect();
        let tree =
            MerkleTreeWithCap::<F, H>::construct_by_chunking_from_flat_sources(&[&a[..]], 4, 16, &worker);
        assert_eq!(tree.get_cap().len(), 2);
        let (leaf, proof) = tree.get_proof(1);
        assert!(proof.is_empty());
        assert!(MerkleTreeWithCap::<F, H>::verify_proof_over_cap(
            &proof,
            &tree.get_cap(),
            leaf,
            1
        ));
    }
}
