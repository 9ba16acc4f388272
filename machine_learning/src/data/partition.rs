use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// The disjoint index sets owned by each client, indexed by client id.
pub type Partition = Vec<Vec<usize>>;

/// Deals `len` samples uniformly at random among `clients`.
///
/// Properties:
/// - Index sets are disjoint and all have `len / clients` samples.
/// - The `len % clients` leftover samples aren't assigned to anyone.
///
/// # Arguments
/// * `len` - The amount of samples in the dataset.
/// * `clients` - The amount of clients.
/// * `rng` - The source of randomness for the shuffle.
///
/// # Returns
/// The partition or an `InvalidConfig` error if a client would end up with no samples.
pub fn iid<R: Rng + ?Sized>(len: usize, clients: usize, rng: &mut R) -> Result<Partition> {
    let per_client = checked_share(len, clients, "clients")?;

    let mut idxs: Vec<usize> = (0..len).collect();
    idxs.shuffle(rng);

    Ok(idxs
        .chunks_exact(per_client)
        .take(clients)
        .map(<[usize]>::to_vec)
        .collect())
}

/// Sorts the samples by label, cuts them in `clients * shards_per_client` contiguous shards
/// and gives each client `shards_per_client` of them at random.
///
/// With few shards per client each one only sees a handful of classes.
///
/// # Arguments
/// * `labels` - The label of every sample.
/// * `clients` - The amount of clients.
/// * `shards_per_client` - How many label-sorted shards each client receives.
/// * `rng` - The source of randomness for the shard assignment.
///
/// # Returns
/// The partition or an `InvalidConfig` error if a shard would be empty.
pub fn non_iid<R: Rng + ?Sized>(
    labels: &[usize],
    clients: usize,
    shards_per_client: usize,
    rng: &mut R,
) -> Result<Partition> {
    if shards_per_client == 0 {
        return Err(MlErr::InvalidConfig(
            "shards_per_client must be positive".into(),
        ));
    }

    let nshards = clients * shards_per_client;
    let shard_len = checked_share(labels.len(), nshards, "shards")?;

    let mut sorted: Vec<usize> = (0..labels.len()).collect();
    sorted.sort_by_key(|&i| (labels[i], i));

    let mut shard_ids: Vec<usize> = (0..nshards).collect();
    shard_ids.shuffle(rng);

    let partition = shard_ids
        .chunks_exact(shards_per_client)
        .map(|shards| {
            shards
                .iter()
                .flat_map(|&s| sorted[s * shard_len..(s + 1) * shard_len].iter().copied())
                .collect()
        })
        .collect();

    Ok(partition)
}

fn checked_share(len: usize, parts: usize, what: &str) -> Result<usize> {
    if parts == 0 {
        return Err(MlErr::InvalidConfig(format!("there must be at least one of {what}")));
    }

    let share = len / parts;
    if share == 0 {
        return Err(MlErr::InvalidConfig(format!(
            "{len} samples can't be split among {parts} {what} without empty shards"
        )));
    }

    Ok(share)
}
