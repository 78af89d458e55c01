//! Tab-separated projection of the deduplicated activation set.

use std::io::Write;

use anyhow::Result;

use progindex_core::checkpoint::StoredDeployment;

pub const HEADER: [&str; 11] = [
    "id",
    "inserted at",
    "chain id",
    "block number",
    "block hash",
    "transaction hash",
    "contract address",
    "code hash",
    "module hash",
    "data fee",
    "version",
];

/// Write `rows` as TSV with a header row. Returns the number of data rows.
pub fn write_tsv<W: Write>(out: W, rows: &[StoredDeployment]) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
    writer.write_record(HEADER)?;
    for row in rows {
        let r = &row.record;
        writer.write_record([
            row.id.to_string(),
            row.inserted_at.to_rfc3339(),
            r.chain_id.to_string(),
            r.block_number.to_string(),
            r.block_hash.clone(),
            r.transaction_hash.clone(),
            r.contract_address.clone(),
            r.code_hash.clone(),
            r.module_hash.clone(),
            r.data_fee.clone(),
            r.version.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(rows.len())
}
