//! Tab-separated partition files
//!
//! Each row is one yearly observation of one institution. See [`Row`] for the
//! column layout. Files may be gzip-compressed, which is signaled by a `.gz`
//! file name extension.

use crate::{
    classification::Classification,
    institution::{DegreeStatus, Link},
    UnitId, Year,
};
use async_compression::tokio::{bufread::GzipDecoder, write::GzipEncoder};
use csv_async::{AsyncReaderBuilder, AsyncWriterBuilder};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt};

/// Yearly observation of an institution
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Row {
    /// Institution identifier
    pub unit_id: UnitId,

    /// Year on which the data was recorded
    pub year: Year,

    /// Name that the institution went by that year
    pub name: Box<str>,

    /// Most recent name of the institution
    pub current_name: Box<str>,

    /// Classification category (empty if unknown)
    pub classification: Option<Classification>,

    /// Degree-granting status (empty if unknown)
    pub degree_status: Option<DegreeStatus>,

    /// Relationship links, separated by [`crate::institution::LINK_SEPARATOR`]
    #[serde(with = "links_column")]
    pub links: Box<[Link]>,
}

/// Truth that a file name designates gzip-compressed data
pub fn is_gzipped(file: &str) -> bool {
    file.ends_with(".gz")
}

/// Decode rows from a byte stream
pub fn decode_rows(
    bytes: Pin<Box<dyn AsyncBufRead + Send>>,
    gzipped: bool,
) -> impl Stream<Item = csv_async::Result<Row>> + Send {
    // Apply gzip decoder to compressed bytes
    let tsv_bytes: Pin<Box<dyn AsyncRead + Send>> = if gzipped {
        Box::pin(GzipDecoder::new(bytes))
    } else {
        Box::pin(bytes)
    };

    // Apply TSV decoder to uncompressed bytes
    AsyncReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .create_deserializer(tsv_bytes)
        .into_deserialize::<Row>()
}

/// Encode rows as gzip-compressed TSV, returning the output once all data
/// has been flushed into it
pub async fn encode_rows<W: AsyncWrite + Unpin + Send>(
    output: W,
    rows: impl IntoIterator<Item = Row>,
) -> crate::Result<W> {
    let mut serializer = AsyncWriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .create_serializer(GzipEncoder::new(output));
    for row in rows {
        serializer.serialize(row).await?;
    }
    let mut gz_bytes = serializer
        .into_inner()
        .await
        .map_err(|e| anyhow::format_err!("flushing TSV rows: {e}"))?;
    gz_bytes.shutdown().await?;
    Ok(gz_bytes.into_inner())
}

/// Serde adapter for the links column
mod links_column {
    use crate::institution::{self, Link};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(links: &[Link], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&institution::format_links(links))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Box<[Link]>, D::Error> {
        let column = String::deserialize(deserializer)?;
        institution::parse_links(&column)
            .map(Vec::into_boxed_slice)
            .map_err(D::Error::custom)
    }
}
