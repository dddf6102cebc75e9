//! Offline partitioning of the institution dataset
//!
//! The source data is one big table of yearly observations. Serving it as-is
//! would force every user to download all of it before seeing anything, so
//! instead we slice it into partitions of a few thousand institutions:
//!
//! - Institutions are sorted by caseless current name, so that name searches
//!   only need to look at the partitions whose name range matches.
//! - Every relationship link is mirrored onto the record of its target, so
//!   that lineage resolution can walk relationships in both directions.
//! - A JSON index records the name range of each partition and the partition
//!   of every institution.

use crate::{
    config::Config,
    institution::InstitutionRecord,
    partition::{
        builder::{self, RecordBuilder},
        index::INDEX_FILE,
        PartitionId, PartitionIndex, PartitionInfo,
    },
    progress::{ProgressConfig, ProgressReport, Work},
    tsv, Result,
};
use anyhow::Context;
use futures::StreamExt;
use std::{collections::HashMap, num::NonZeroUsize, path::Path, pin::pin, sync::Arc};
use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt, BufReader, BufWriter},
    task::JoinSet,
};

/// File name of a partition
pub fn partition_file_name(id: PartitionId) -> String {
    format!("part-{id:02}.tsv.gz")
}

/// Cut name-sorted records into partitions and index them
pub fn partition(
    records: Vec<InstitutionRecord>,
    partition_size: NonZeroUsize,
) -> Result<(PartitionIndex, Vec<Vec<InstitutionRecord>>)> {
    let mut infos = Vec::new();
    let mut institutions = HashMap::with_capacity(records.len());
    let mut partitions = Vec::new();
    let mut records = records.into_iter().peekable();
    while records.peek().is_some() {
        let id = PartitionId::try_from(partitions.len())
            .context("too many partitions, please increase the partition size")?;
        let chunk = records.by_ref().take(partition_size.get()).collect::<Vec<_>>();
        let (Some(first), Some(last)) = (chunk.first(), chunk.last()) else {
            unreachable!("peek() said there was at least one more record")
        };
        infos.push(PartitionInfo {
            file: partition_file_name(id).into(),
            first_name: first.current_name.clone(),
            last_name: last.current_name.clone(),
            records: chunk.len(),
        });
        institutions.extend(chunk.iter().map(|record| (record.unit_id, id)));
        partitions.push(chunk);
    }
    Ok((PartitionIndex::new(infos, institutions), partitions))
}

/// Partition a flat table of yearly observations into `output_dir`
pub async fn prepare(
    config: Arc<Config>,
    input: &Path,
    output_dir: &Path,
    report: &ProgressReport,
) -> Result<PartitionIndex> {
    // Collect the source data
    let context = || format!("reading source data from {}", input.display());
    let file = File::open(input).await.with_context(context)?;
    let gzipped = tsv::is_gzipped(&input.to_string_lossy());
    let mut rows = pin!(tsv::decode_rows(Box::pin(BufReader::new(file)), gzipped));
    let mut builder = RecordBuilder::new();
    let mut num_rows = 0usize;
    while let Some(row) = rows.next().await {
        builder.add_row(row.with_context(context)?);
        num_rows += 1;
    }
    log::info!(
        "Read {num_rows} yearly observations of {} institutions",
        builder.len()
    );

    // Make relationships walkable from both sides and sort by name
    builder.mirror_links();
    let (index, partitions) = partition(builder.finish(), config.partition_size)?;

    // Write down the partitions
    fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    let writing = report.add(
        "Writing partitions",
        ProgressConfig::new(Work::Steps(partitions.len())).dont_show_rate_eta(),
    );
    let mut writes = JoinSet::new();
    for (idx, records) in partitions.into_iter().enumerate() {
        let path = output_dir.join(partition_file_name(
            PartitionId::try_from(idx).expect("partition() checked partition ids"),
        ));
        let rows = records.iter().flat_map(builder::rows).collect::<Vec<_>>();
        writes.spawn(async move {
            let context = || format!("writing partition {}", path.display());
            let file = File::create(&path).await.with_context(context)?;
            let mut file = tsv::encode_rows(BufWriter::new(file), rows)
                .await
                .with_context(context)?;
            file.flush().await.with_context(context)?;
            Ok::<_, anyhow::Error>(())
        });
    }
    while let Some(write) = writes.join_next().await {
        write.context("collecting results from one partition write")??;
        writing.make_progress(1);
    }

    // Write down the index last, so that it never points to missing files
    let index_path = output_dir.join(INDEX_FILE);
    let json = index.to_json().context("converting partition index to JSON")?;
    fs::write(&index_path, &json)
        .await
        .with_context(|| format!("writing {}", index_path.display()))?;
    log::info!(
        "Wrote {} partitions of up to {} institutions into {}",
        index.len(),
        config.partition_size,
        output_dir.display()
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        archive::Archive,
        partition::{DirSource, PartitionSource},
    };

    #[test]
    fn partitions_are_contiguous_name_ranges() {
        let mut builder = RecordBuilder::new();
        for (unit_id, name) in [(1, "delta"), (2, "Alpha"), (3, "charlie"), (4, "Bravo"), (5, "echo")] {
            builder.add_row(tsv::Row {
                unit_id,
                year: 2000,
                name: name.into(),
                current_name: name.into(),
                classification: None,
                degree_status: None,
                links: Box::new([]),
            });
        }
        let (index, partitions) =
            partition(builder.finish(), NonZeroUsize::new(2).unwrap()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(partitions.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        let info = index.partition(1).unwrap();
        assert_eq!((&*info.first_name, &*info.last_name), ("charlie", "delta"));
        assert_eq!(&*info.file, "part-01.tsv.gz");
        assert_eq!(index.partition_of(4), Some(0));
        assert_eq!(index.partition_of(5), Some(2));
    }

    #[tokio::test]
    async fn prepared_directory_can_be_served() {
        let dir = std::env::temp_dir().join(format!("campus-lineage-prepare-{}", std::process::id()));
        fs::create_dir_all(&dir).await.unwrap();
        let input = dir.join("source.tsv");
        fs::write(
            &input,
            "1\t1973\tAlpha College\tAlpha University\tB\tY\t\n\
             1\t1990\tAlpha University\tAlpha University\tM\tY\tmerged-into:2@2005\n\
             2\t2005\tBeta University\tBeta University\tR2\tY\t\n\
             3\t1980\tSaint Mary's College\tSaint Mary's College\tB\tY\t\n",
        )
        .await
        .unwrap();
        let output = dir.join("dataset");
        let config = Arc::new(Config {
            partition_size: NonZeroUsize::new(2).unwrap(),
            ..Config::default()
        });

        let index = prepare(config.clone(), &input, &output, &ProgressReport::new())
            .await
            .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.num_institutions(), 3);

        let source: Arc<dyn PartitionSource> = Arc::new(DirSource::new(&output));
        let archive = Archive::open(config, source).await.unwrap();
        let chain = archive.lineage(1).await.unwrap();
        assert_eq!(chain.nodes().len(), 3);
        let beta = chain.records().iter().find(|record| record.unit_id == 2).unwrap();
        assert_eq!(beta.predecessors().collect::<Vec<_>>(), vec![(1, 2005)]);

        fs::remove_dir_all(&dir).await.unwrap();
    }
}
