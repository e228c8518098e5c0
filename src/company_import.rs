//! Import of the Receita Federal "Empresas" files.
//!
//! Each archive (`EmpresasN.zip`) holds one `*.EMPRECSV` member: a headerless,
//! `;`-separated, Latin-1 encoded CSV with one company per line.

use crate::errors::{AppError, ResultExt};
use crate::models::Company;
use crate::storage;
use bigdecimal::{BigDecimal, RoundingMode, Zero};
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use sqlx::PgPool;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::str::FromStr;
use zip::ZipArchive;

/// Rows per upsert.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Marker of the companies member inside the archive.
const ENTRY_MARKER: &str = "EMPRECSV";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompanyImportSummary {
    /// CSV rows read from the archive.
    pub rows_processed: u64,
    pub chunks: u64,
    /// Companies in the table after the import.
    pub companies_total: i64,
}

/// Name of the first archive member whose upper-cased name contains `EMPRECSV`.
pub fn find_company_entry<R: Read + Seek>(archive: &ZipArchive<R>) -> Result<String, AppError> {
    archive
        .file_names()
        .find(|name| name.to_uppercase().contains(ENTRY_MARKER))
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::ImportError(format!(
                "No '{}' CSV file found in the ZIP archive.",
                ENTRY_MARKER
            ))
        })
}

/// `capital_social` uses a decimal comma ("1000,00"). Anything that does not
/// parse counts as zero; the result is rounded half-to-even to two places.
pub fn parse_capital_social(raw: &str) -> BigDecimal {
    let normalized = raw.trim().replace(',', ".");
    // Plain decimals only: exponent forms could expand to enormous values.
    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        return BigDecimal::zero().with_scale(2);
    }
    BigDecimal::from_str(&normalized)
        .unwrap_or_else(|_| BigDecimal::zero())
        .with_scale_round(2, RoundingMode::HalfEven)
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Maps one CSV record (cnpj, razao_social, natureza_juridica,
/// qualificacao_responsavel, capital_social, porte_empresa,
/// ente_federativo_responsavel) to a company. Missing trailing fields read as
/// empty.
pub fn company_from_record(record: &csv::StringRecord) -> Company {
    let field = |i: usize| record.get(i).unwrap_or("");
    Company {
        cnpj: field(0).to_string(),
        razao_social: field(1).to_string(),
        natureza_juridica: field(2).to_string(),
        qualificacao_responsavel: field(3).to_string(),
        capital_social: parse_capital_social(field(4)),
        porte_empresa: optional(field(5)),
        ente_federativo_responsavel: optional(field(6)),
    }
}

/// Collapses repeated cnpjs to their last occurrence. A single upsert cannot
/// touch the same key twice.
pub fn dedupe_by_cnpj(companies: Vec<Company>) -> Vec<Company> {
    let mut last_index: HashMap<&str, usize> = HashMap::with_capacity(companies.len());
    for (i, c) in companies.iter().enumerate() {
        last_index.insert(c.cnpj.as_str(), i);
    }
    if last_index.len() == companies.len() {
        return companies;
    }

    let keep: Vec<bool> = companies
        .iter()
        .enumerate()
        .map(|(i, c)| last_index.get(c.cnpj.as_str()) == Some(&i))
        .collect();
    drop(last_index);

    companies
        .into_iter()
        .zip(keep)
        .filter_map(|(c, keep)| keep.then_some(c))
        .collect()
}

/// Reads the EMPRECSV layout in fixed-size chunks.
pub struct CompanyChunks<R: Read> {
    records: csv::StringRecordsIntoIter<DecodeReaderBytes<R, Vec<u8>>>,
    chunk_size: usize,
}

impl<R: Read> CompanyChunks<R> {
    /// Wraps a raw (Latin-1) byte stream.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        let decoded = DecodeReaderBytesBuilder::new()
            .encoding(Some(encoding_rs::WINDOWS_1252))
            .build(reader);
        let records = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(decoded)
            .into_records();

        Self {
            records,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl<R: Read> Iterator for CompanyChunks<R> {
    type Item = Result<Vec<Company>, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = Vec::with_capacity(self.chunk_size.min(DEFAULT_CHUNK_SIZE));
        while chunk.len() < self.chunk_size {
            match self.records.next() {
                Some(Ok(record)) => chunk.push(company_from_record(&record)),
                Some(Err(e)) => return Some(Err(e.into())),
                None => break,
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(Ok(chunk))
        }
    }
}

/// Imports the companies member of the ZIP at `zip_path`.
pub async fn import_archive(
    pool: &PgPool,
    zip_path: &Path,
    chunk_size: usize,
) -> Result<CompanyImportSummary, AppError> {
    tracing::info!("Starting company data import from {}...", zip_path.display());

    let file = File::open(zip_path)
        .map_err(AppError::from)
        .with_context(|| format!("opening {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)?;
    let entry_name = find_company_entry(&archive)?;
    tracing::info!("Found CSV file in ZIP: {}", entry_name);

    let entry = archive.by_name(&entry_name)?;
    import_reader(pool, entry, chunk_size).await
}

/// Upserts every company read from `reader` in one transaction.
pub async fn import_reader<R: Read>(
    pool: &PgPool,
    reader: R,
    chunk_size: usize,
) -> Result<CompanyImportSummary, AppError> {
    let mut tx = pool.begin().await.context("opening import transaction")?;
    let mut summary = CompanyImportSummary::default();

    for (i, chunk) in CompanyChunks::new(reader, chunk_size).enumerate() {
        let chunk = chunk.with_context(|| format!("reading chunk {}", i + 1))?;
        let rows = chunk.len() as u64;

        storage::upsert_companies(&mut tx, &dedupe_by_cnpj(chunk))
            .await
            .with_context(|| format!("upserting chunk {}", i + 1))?;

        summary.chunks += 1;
        summary.rows_processed += rows;
        tracing::info!(
            "Processed chunk {}... Total rows so far: {}",
            i + 1,
            summary.rows_processed
        );
    }

    summary.companies_total = storage::count_companies(&mut tx).await?;
    tx.commit().await.context("committing import")?;

    tracing::info!(
        "Successfully imported data for {} companies.",
        summary.companies_total
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format_money;

    fn company(cnpj: &str, razao: &str) -> Company {
        Company {
            cnpj: cnpj.to_string(),
            razao_social: razao.to_string(),
            natureza_juridica: "2062".to_string(),
            qualificacao_responsavel: "49".to_string(),
            capital_social: BigDecimal::zero(),
            porte_empresa: None,
            ente_federativo_responsavel: None,
        }
    }

    #[test]
    fn capital_social_uses_decimal_comma() {
        assert_eq!(format_money(&parse_capital_social("1000,50")), "1000.50");
        assert_eq!(format_money(&parse_capital_social("0,00")), "0.00");
        assert_eq!(format_money(&parse_capital_social("12,346")), "12.35");
        assert_eq!(format_money(&parse_capital_social("12,345")), "12.34");
        assert_eq!(format_money(&parse_capital_social("")), "0.00");
        assert_eq!(format_money(&parse_capital_social("n/a")), "0.00");
        assert_eq!(format_money(&parse_capital_social("1e9")), "0.00");
    }

    #[test]
    fn short_records_leave_optional_columns_empty() {
        let record = csv::StringRecord::from(vec!["12345678", "ACME LTDA", "2062", "49", "10,00"]);
        let c = company_from_record(&record);
        assert_eq!(c.cnpj, "12345678");
        assert_eq!(format_money(&c.capital_social), "10.00");
        assert_eq!(c.porte_empresa, None);
        assert_eq!(c.ente_federativo_responsavel, None);
    }

    #[test]
    fn dedupe_keeps_last_occurrence() {
        let out = dedupe_by_cnpj(vec![
            company("1", "first"),
            company("2", "other"),
            company("1", "second"),
        ]);
        let names: Vec<&str> = out.iter().map(|c| c.razao_social.as_str()).collect();
        assert_eq!(names, vec!["other", "second"]);
    }

    #[test]
    fn chunks_split_and_decode_latin1() {
        // "PADARIA SÃO JOÃO" in Latin-1
        let mut data = b"\"00000001\";\"PADARIA S\xc3O JO\xc3O\";\"2135\";\"50\";\"0,00\";\"01\";\"\"\n".to_vec();
        data.extend_from_slice(b"\"00000002\";\"B\";\"2062\";\"49\";\"5000,00\";\"03\";\"\"\n");
        data.extend_from_slice(b"\"00000003\";\"C\";\"1015\";\"32\";\"0,00\";\"\";\"UNIAO\"\n");

        let chunks: Vec<Vec<Company>> = CompanyChunks::new(&data[..], 2)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[1].len(), 1);
        assert_eq!(chunks[0][0].razao_social, "PADARIA SÃO JOÃO");
        assert_eq!(chunks[0][0].porte_empresa.as_deref(), Some("01"));
        assert_eq!(format_money(&chunks[0][1].capital_social), "5000.00");
        assert_eq!(chunks[1][0].porte_empresa, None);
        assert_eq!(
            chunks[1][0].ente_federativo_responsavel.as_deref(),
            Some("UNIAO")
        );
    }
}
