use crate::adapters::spreadsheet;
use crate::core::cleaner::DataCleaner;
use crate::core::matcher::match_birthdays;
use crate::core::{ConfigProvider, Notifier, Pipeline, Storage};
use crate::domain::model::{
    CleanRecord, CleanRow, MatchResult, Notification, NotificationOutcome, NotifySummary,
    RawRecord, ReferenceDate, Rejection, RunReport, TransformResult,
};
use crate::utils::error::{EtlError, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use zip::write::{SimpleFileOptions, ZipWriter};

const CLEAN_HEADER: [&str; 6] = ["name", "email", "dob", "birth_year", "birth_month", "birth_day"];
const REJECTED_HEADER: [&str; 5] = ["row", "name", "email", "dob", "reason"];

/// Reader → cleaner → writer → matcher → notifier for one birthday list.
pub struct BirthdayPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    notifier: Box<dyn Notifier>,
}

impl<S: Storage, C: ConfigProvider> BirthdayPipeline<S, C> {
    pub fn new(storage: S, config: C, notifier: Box<dyn Notifier>) -> Self {
        Self {
            storage,
            config,
            notifier,
        }
    }

    fn output_file(&self, name: &str) -> String {
        Path::new(self.config.output_path())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    async fn deliver(&self, matched: &MatchResult) -> NotificationOutcome {
        let notification = render_notification(
            &matched.record,
            self.config.subject_template(),
            self.config.body_template(),
        );

        let error = match self.notifier.notify(&notification).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("❌ Failed to notify {}: {}", notification.to, e);
                Some(match e {
                    EtlError::NotificationError { message, .. } => message,
                    other => other.to_string(),
                })
            }
        };

        NotificationOutcome {
            name: notification.name,
            email: notification.to,
            error,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for BirthdayPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<RawRecord>> {
        let path = self.config.input_path();
        let format = source_format(path)?;

        tracing::info!("📥 Extracting birthday data from {}", path);
        let data = self.storage.read_file(path).await?;
        let records = match format {
            SourceFormat::Delimited(delimiter) => {
                read_records(&data, delimiter, self.config.field_mapping())?
            }
            SourceFormat::Spreadsheet => read_sheet_records(data, self.config.field_mapping())?,
        };

        tracing::info!("Successfully extracted {} records", records.len());
        Ok(records)
    }

    async fn transform(&self, data: Vec<RawRecord>) -> Result<TransformResult> {
        let extracted = data.len();
        let cleaner = DataCleaner::new(self.config.reject_ambiguous_dates());

        Ok(TransformResult {
            extracted,
            cleaned: cleaner.clean(data),
        })
    }

    async fn load(&self, result: &TransformResult) -> Result<Vec<String>> {
        let formats = self.config.output_formats();
        let names = self.config.output_filenames();
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();

        if formats.iter().any(|f| f == "csv") {
            files.push((names.cleaned_csv, clean_csv(&result.cleaned.records)?));
            files.push((names.rejected_csv, rejected_csv(&result.cleaned.rejections)?));
        }

        let rows: Vec<CleanRow> = result.cleaned.records.iter().map(CleanRow::from).collect();
        if formats.iter().any(|f| f == "json") {
            files.push((names.cleaned_json, serde_json::to_vec_pretty(&rows)?));
        }

        if formats.iter().any(|f| f == "xlsx") {
            files.push((
                names.cleaned_xlsx,
                spreadsheet::write_clean_rows(&CLEAN_HEADER, &rows)?,
            ));
        }

        if files.is_empty() {
            tracing::warn!("No output formats specified. Data not saved.");
            return Ok(Vec::new());
        }

        if let Some(archive) = self.config.archive_name() {
            tracing::debug!("Creating ZIP archive with {} files", files.len());
            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (name, data) in &files {
                    zip.start_file(name.as_str(), SimpleFileOptions::default())?;
                    zip.write_all(data)?;
                }
                zip.finish()?.into_inner()
            };

            let path = self.output_file(archive);
            self.storage.write_file(&path, &zip_data).await?;
            tracing::info!("💾 Saved {} files to {}", files.len(), path);
            return Ok(vec![path]);
        }

        let mut written = Vec::with_capacity(files.len());
        for (name, data) in files {
            let path = self.output_file(&name);
            self.storage.write_file(&path, &data).await?;
            tracing::info!("💾 Saved {}", path);
            written.push(path);
        }
        Ok(written)
    }

    fn check(&self, result: &TransformResult, reference: ReferenceDate) -> Vec<MatchResult> {
        let matches = match_birthdays(&result.cleaned.records, reference);
        for m in &matches {
            tracing::info!("🎂 Birthday today: {} ({})", m.record.name(), m.record.email());
        }
        matches
    }

    async fn notify(&self, matches: &[MatchResult]) -> Result<NotifySummary> {
        let concurrency = self.config.notify_concurrency().max(1);
        tracing::info!(
            "📨 Sending {} notification(s) via {} (concurrency {})",
            matches.len(),
            self.notifier.transport(),
            concurrency
        );

        // 每筆結果各自回傳，全部完成後再合併，平行發送時不會遺失計數
        let deliveries: Vec<_> = matches.iter().map(|m| self.deliver(m)).collect();
        let outcomes: Vec<NotificationOutcome> = stream::iter(deliveries)
            .buffered(concurrency)
            .collect()
            .await;

        let summary = NotifySummary { outcomes };
        tracing::info!(
            "Notification sending complete. Success: {}, Failed: {}",
            summary.sent(),
            summary.failed()
        );
        Ok(summary)
    }

    async fn summarize(&self, report: &RunReport) -> Result<Option<String>> {
        if !self.config.output_formats().iter().any(|f| f == "json") {
            return Ok(None);
        }

        let path = self.output_file(&self.config.output_filenames().report_json);
        let data = serde_json::to_vec_pretty(report)?;
        self.storage.write_file(&path, &data).await?;
        tracing::info!("📝 Run report saved to {}", path);
        Ok(Some(path))
    }
}

/// How a source file is parsed, chosen by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited(u8),
    Spreadsheet,
}

pub fn source_format(path: &str) -> Result<SourceFormat> {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("csv") => Ok(SourceFormat::Delimited(b',')),
        Some("tsv") => Ok(SourceFormat::Delimited(b'\t')),
        Some("xlsx") | Some("xls") => Ok(SourceFormat::Spreadsheet),
        other => Err(EtlError::UnsupportedSource {
            path: path.to_string(),
            reason: format!("unsupported file extension: {}", other.unwrap_or("none")),
        }),
    }
}

struct ColumnIndex {
    name: usize,
    email: usize,
    dob: usize,
}

impl ColumnIndex {
    fn record<'a>(&self, cell: impl Fn(usize) -> Option<&'a str>) -> RawRecord {
        let text = |index: usize| cell(index).unwrap_or("").to_string();
        RawRecord {
            name: text(self.name),
            email: text(self.email),
            date_of_birth: text(self.dob),
        }
    }
}

fn canonical_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

fn resolve_columns<'h>(
    headers: impl IntoIterator<Item = &'h str>,
    mapping: Option<&HashMap<String, String>>,
) -> Result<ColumnIndex> {
    let mapping: HashMap<String, &str> = mapping
        .map(|m| {
            m.iter()
                .map(|(from, to)| (canonical_header(from), to.as_str()))
                .collect()
        })
        .unwrap_or_default();

    let mut found: HashMap<&str, usize> = HashMap::new();
    for (index, header) in headers.into_iter().enumerate() {
        let header = canonical_header(header);
        let column = match mapping.get(&header) {
            Some(target) => *target,
            None => match header.as_str() {
                "name" => "name",
                "email" => "email",
                "dob" | "date_of_birth" => "dob",
                _ => continue,
            },
        };
        found.entry(column).or_insert(index);
    }

    let missing: Vec<String> = ["name", "email", "dob"]
        .iter()
        .filter(|c| !found.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(EtlError::MissingColumns { columns: missing });
    }

    Ok(ColumnIndex {
        name: found["name"],
        email: found["email"],
        dob: found["dob"],
    })
}

/// Parses delimited bytes into raw rows in source order. Short rows yield
/// empty fields; only a missing required column is an error.
pub fn read_records(
    data: &[u8],
    delimiter: u8,
    mapping: Option<&HashMap<String, String>>,
) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let columns = resolve_columns(headers.iter(), mapping)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(columns.record(|index| row.get(index)));
    }

    Ok(records)
}

/// Same contract as [`read_records`] for the first sheet of a workbook.
pub fn read_sheet_records(
    data: Vec<u8>,
    mapping: Option<&HashMap<String, String>>,
) -> Result<Vec<RawRecord>> {
    let rows = spreadsheet::read_first_sheet(data)?;
    let Some((headers, body)) = rows.split_first() else {
        return Err(EtlError::MissingColumns {
            columns: vec!["name".to_string(), "email".to_string(), "dob".to_string()],
        });
    };

    let columns = resolve_columns(headers.iter().map(String::as_str), mapping)?;
    Ok(body
        .iter()
        // 整列空白的儲存格不算資料
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| columns.record(|index| row.get(index).map(String::as_str)))
        .collect())
}

#[derive(Serialize)]
struct RejectedRow<'a> {
    row: usize,
    name: &'a str,
    email: &'a str,
    dob: &'a str,
    reason: &'static str,
}

fn write_csv<T: Serialize>(header: &[&str], rows: impl IntoIterator<Item = T>) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

fn clean_csv(records: &[CleanRecord]) -> Result<Vec<u8>> {
    write_csv(&CLEAN_HEADER, records.iter().map(CleanRow::from))
}

fn rejected_csv(rejections: &[Rejection]) -> Result<Vec<u8>> {
    write_csv(
        &REJECTED_HEADER,
        rejections.iter().map(|r| RejectedRow {
            row: r.row,
            name: &r.record.name,
            email: &r.record.email,
            dob: &r.record.date_of_birth,
            reason: r.reason.code(),
        }),
    )
}

/// Fills `{name}`, `{first_name}` and `{email}` in the configured templates.
pub fn render_notification(record: &CleanRecord, subject: &str, body: &str) -> Notification {
    let fill = |template: &str| {
        template
            .replace("{first_name}", record.first_name())
            .replace("{name}", record.name())
            .replace("{email}", record.email())
    };

    Notification {
        to: record.email().to_string(),
        name: record.name().to_string(),
        subject: fill(subject),
        body: fill(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::notifier::{LogNotifier, UnconfiguredNotifier};
    use crate::core::cleaner::clean;
    use crate::domain::model::{OutputFilenames, RejectReason};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn put(&self, path: &str, data: &str) {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.as_bytes().to_vec());
        }

        async fn put_bytes(&self, path: &str, data: Vec<u8>) {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data);
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }

        async fn get_text(&self, path: &str) -> String {
            String::from_utf8(self.get_file(path).await.unwrap()).unwrap()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        input_path: String,
        output_formats: Vec<String>,
        field_mapping: Option<HashMap<String, String>>,
        reject_ambiguous_dates: bool,
        concurrency: usize,
        archive: Option<String>,
    }

    impl MockConfig {
        fn new(input_path: &str) -> Self {
            Self {
                input_path: input_path.to_string(),
                output_formats: vec!["csv".to_string(), "json".to_string()],
                field_mapping: None,
                reject_ambiguous_dates: false,
                concurrency: 1,
                archive: None,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn input_path(&self) -> &str {
            &self.input_path
        }

        fn output_path(&self) -> &str {
            "out"
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn field_mapping(&self) -> Option<&HashMap<String, String>> {
            self.field_mapping.as_ref()
        }

        fn reject_ambiguous_dates(&self) -> bool {
            self.reject_ambiguous_dates
        }

        fn notify_concurrency(&self) -> usize {
            self.concurrency
        }

        fn subject_template(&self) -> &str {
            "Happy Birthday {name}!"
        }

        fn body_template(&self) -> &str {
            "Dear {first_name}, enjoy your day."
        }

        fn archive_name(&self) -> Option<&str> {
            self.archive.as_deref()
        }
    }

    /// Records every notification and fails the addresses it was told to.
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<Notification>>>,
        fail_for: Vec<String>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl RecordingNotifier {
        fn new(fail_for: &[&str]) -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                fail_for: fail_for.iter().map(|s| s.to_string()).collect(),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.sent.lock().await.push(notification.clone());
            if self.fail_for.contains(&notification.to) {
                return Err(EtlError::NotificationError {
                    recipient: notification.to.clone(),
                    message: "mailbox unavailable".to_string(),
                });
            }
            Ok(())
        }

        fn transport(&self) -> &'static str {
            "recording"
        }
    }

    const SAMPLE_CSV: &str = "name,email,dob\n\
        John Doe,john@x.com,1990-01-15\n\
        Jane Smith,jane@x.com,1985-05-20\n";

    fn matches_for(rows: &[(&str, &str, &str)], reference: ReferenceDate) -> Vec<MatchResult> {
        let raw = rows
            .iter()
            .map(|(n, e, d)| RawRecord::new(*n, *e, *d))
            .collect();
        match_birthdays(&clean(raw).records, reference)
    }

    #[tokio::test]
    async fn test_extract_csv_in_source_order() {
        let storage = MockStorage::new();
        storage.put("birthdays.csv", SAMPLE_CSV).await;
        let pipeline = BirthdayPipeline::new(
            storage,
            MockConfig::new("birthdays.csv"),
            Box::new(LogNotifier),
        );

        let records = pipeline.extract().await.unwrap();

        assert_eq!(
            records,
            vec![
                RawRecord::new("John Doe", "john@x.com", "1990-01-15"),
                RawRecord::new("Jane Smith", "jane@x.com", "1985-05-20"),
            ]
        );
    }

    #[tokio::test]
    async fn test_extract_tsv_with_mapping_and_short_rows() {
        let storage = MockStorage::new();
        storage
            .put(
                "people.tsv",
                "\u{feff}Full Name\tE-Mail\tBirthday\tTeam\n  ann lee \tANN@X.COM\t15/01/1990\tOps\nBob\tbob@x.com\n",
            )
            .await;
        let mut config = MockConfig::new("people.tsv");
        config.field_mapping = Some(HashMap::from([
            ("full name".to_string(), "name".to_string()),
            ("E-Mail".to_string(), "email".to_string()),
            ("Birthday".to_string(), "dob".to_string()),
        ]));
        let pipeline = BirthdayPipeline::new(storage, config, Box::new(LogNotifier));

        let records = pipeline.extract().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0], RawRecord::new("  ann lee ", "ANN@X.COM", "15/01/1990"));
        assert_eq!(records[1], RawRecord::new("Bob", "bob@x.com", ""));
    }

    #[tokio::test]
    async fn test_extract_missing_columns_is_fatal() {
        let storage = MockStorage::new();
        storage.put("birthdays.csv", "name,mail\nJohn,john@x.com\n").await;
        let pipeline = BirthdayPipeline::new(
            storage,
            MockConfig::new("birthdays.csv"),
            Box::new(LogNotifier),
        );

        match pipeline.extract().await.unwrap_err() {
            EtlError::MissingColumns { columns } => assert_eq!(columns, vec!["email", "dob"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_extract_empty_file_and_missing_file() {
        let storage = MockStorage::new();
        storage.put("empty.csv", "").await;

        let pipeline = BirthdayPipeline::new(
            storage.clone(),
            MockConfig::new("empty.csv"),
            Box::new(LogNotifier),
        );
        assert!(matches!(
            pipeline.extract().await,
            Err(EtlError::MissingColumns { .. })
        ));

        let pipeline =
            BirthdayPipeline::new(storage, MockConfig::new("gone.csv"), Box::new(LogNotifier));
        assert!(matches!(pipeline.extract().await, Err(EtlError::IoError(_))));
    }

    #[tokio::test]
    async fn test_extract_rejects_unsupported_extension() {
        let pipeline = BirthdayPipeline::new(
            MockStorage::new(),
            MockConfig::new("birthdays.pdf"),
            Box::new(LogNotifier),
        );
        assert!(matches!(
            pipeline.extract().await,
            Err(EtlError::UnsupportedSource { .. })
        ));
    }

    #[tokio::test]
    async fn test_extract_xlsx_first_sheet() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, title) in ["Full Name", "E-Mail", "Date_of_Birth"].iter().enumerate() {
            sheet.write_string(0, col as u16, *title).unwrap();
        }
        sheet.write_string(1, 0, "john doe").unwrap();
        sheet.write_string(1, 1, "John@X.com").unwrap();
        sheet.write_string(1, 2, "15/01/1990").unwrap();
        sheet.write_string(3, 0, "Jane Smith").unwrap();
        sheet.write_string(3, 1, "jane@x.com").unwrap();
        let storage = MockStorage::new();
        storage
            .put_bytes("people.xlsx", workbook.save_to_buffer().unwrap())
            .await;

        let mut config = MockConfig::new("people.xlsx");
        config.field_mapping = Some(HashMap::from([
            ("Full Name".to_string(), "name".to_string()),
            ("e-mail".to_string(), "email".to_string()),
        ]));
        let pipeline = BirthdayPipeline::new(storage, config, Box::new(LogNotifier));

        let records = pipeline.extract().await.unwrap();

        assert_eq!(
            records,
            vec![
                RawRecord::new("john doe", "John@X.com", "15/01/1990"),
                RawRecord::new("Jane Smith", "jane@x.com", ""),
            ]
        );
    }

    #[tokio::test]
    async fn test_extract_xlsx_missing_columns_is_fatal() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "name").unwrap();
        sheet.write_string(0, 1, "email").unwrap();
        let storage = MockStorage::new();
        storage
            .put_bytes("people.xlsx", workbook.save_to_buffer().unwrap())
            .await;

        let pipeline =
            BirthdayPipeline::new(storage, MockConfig::new("people.xlsx"), Box::new(LogNotifier));

        match pipeline.extract().await.unwrap_err() {
            EtlError::MissingColumns { columns } => assert_eq!(columns, vec!["dob"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_source_format_by_extension() {
        assert_eq!(source_format("a/b.CSV").unwrap(), SourceFormat::Delimited(b','));
        assert_eq!(source_format("b.tsv").unwrap(), SourceFormat::Delimited(b'\t'));
        assert_eq!(source_format("b.xlsx").unwrap(), SourceFormat::Spreadsheet);
        assert_eq!(source_format("b.xls").unwrap(), SourceFormat::Spreadsheet);
        assert!(source_format("birthdays").is_err());
    }

    #[tokio::test]
    async fn test_transform_honours_strict_dates() {
        let mut config = MockConfig::new("birthdays.csv");
        config.reject_ambiguous_dates = true;
        let pipeline = BirthdayPipeline::new(MockStorage::new(), config, Box::new(LogNotifier));

        let result = pipeline
            .transform(vec![
                RawRecord::new("A", "a@x.com", "03/04/2000"),
                RawRecord::new("B", "b@x.com", "2000-04-03"),
            ])
            .await
            .unwrap();

        assert_eq!(result.extracted, 2);
        assert_eq!(result.cleaned.records.len(), 1);
        assert_eq!(result.cleaned.rejections[0].reason, RejectReason::AmbiguousDate);
    }

    #[tokio::test]
    async fn test_load_writes_clean_rejected_and_json() {
        let storage = MockStorage::new();
        let pipeline = BirthdayPipeline::new(
            storage.clone(),
            MockConfig::new("birthdays.csv"),
            Box::new(LogNotifier),
        );
        let result = pipeline
            .transform(vec![
                RawRecord::new(" john  doe", "John@X.com", "15/01/1990"),
                RawRecord::new("Bad", "nope", "1990-01-01"),
            ])
            .await
            .unwrap();

        let written = pipeline.load(&result).await.unwrap();

        let names = OutputFilenames::default();
        assert_eq!(
            written,
            vec![
                format!("out/{}", names.cleaned_csv),
                format!("out/{}", names.rejected_csv),
                format!("out/{}", names.cleaned_json),
            ]
        );

        let cleaned = storage.get_text("out/cleaned_birthdays.csv").await;
        assert_eq!(
            cleaned,
            "name,email,dob,birth_year,birth_month,birth_day\nJohn Doe,john@x.com,1990-01-15,1990,1,15\n"
        );

        let rejected = storage.get_text("out/rejected_birthdays.csv").await;
        assert_eq!(
            rejected,
            "row,name,email,dob,reason\n2,Bad,nope,1990-01-01,INVALID_EMAIL\n"
        );

        let json: Vec<CleanRow> =
            serde_json::from_slice(&storage.get_file("out/cleaned_birthdays.json").await.unwrap())
                .unwrap();
        assert_eq!(json.len(), 1);
        assert_eq!(json[0].birth_day, 15);
    }

    #[tokio::test]
    async fn test_load_empty_result_still_writes_headers() {
        let storage = MockStorage::new();
        let mut config = MockConfig::new("birthdays.csv");
        config.output_formats = vec!["csv".to_string()];
        let pipeline = BirthdayPipeline::new(storage.clone(), config, Box::new(LogNotifier));

        let result = pipeline.transform(Vec::new()).await.unwrap();
        let written = pipeline.load(&result).await.unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(
            storage.get_text("out/cleaned_birthdays.csv").await,
            "name,email,dob,birth_year,birth_month,birth_day\n"
        );
    }

    #[tokio::test]
    async fn test_load_writes_xlsx_that_reads_back() {
        let storage = MockStorage::new();
        let mut config = MockConfig::new("birthdays.csv");
        config.output_formats = vec!["xlsx".to_string()];
        let pipeline = BirthdayPipeline::new(storage.clone(), config, Box::new(LogNotifier));
        let result = pipeline
            .transform(vec![RawRecord::new("John Doe", "john@x.com", "1990-01-15")])
            .await
            .unwrap();

        let written = pipeline.load(&result).await.unwrap();
        assert_eq!(written, vec!["out/cleaned_birthdays.xlsx"]);

        let data = storage.get_file("out/cleaned_birthdays.xlsx").await.unwrap();
        let records = read_sheet_records(data, None).unwrap();
        assert_eq!(
            records,
            vec![RawRecord::new("John Doe", "john@x.com", "1990-01-15")]
        );
    }

    #[tokio::test]
    async fn test_load_bundles_zip_archive() {
        let storage = MockStorage::new();
        let mut config = MockConfig::new("birthdays.csv");
        config.archive = Some("birthdays.zip".to_string());
        let pipeline = BirthdayPipeline::new(storage.clone(), config, Box::new(LogNotifier));
        let result = pipeline
            .transform(vec![RawRecord::new("John", "john@x.com", "1990-01-15")])
            .await
            .unwrap();

        let written = pipeline.load(&result).await.unwrap();
        assert_eq!(written, vec!["out/birthdays.zip"]);
        assert!(storage.get_file("out/cleaned_birthdays.csv").await.is_none());

        let zip_bytes = storage.get_file("out/birthdays.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        let mut file_names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        file_names.sort();
        assert_eq!(
            file_names,
            vec![
                "cleaned_birthdays.csv",
                "cleaned_birthdays.json",
                "rejected_birthdays.csv"
            ]
        );

        let mut content = String::new();
        std::io::Read::read_to_string(
            &mut archive.by_name("cleaned_birthdays.csv").unwrap(),
            &mut content,
        )
        .unwrap();
        assert!(content.contains("John,john@x.com,1990-01-15,1990,1,15"));
    }

    #[tokio::test]
    async fn test_notify_counts_failures_without_stopping() {
        let notifier = RecordingNotifier::new(&["jane@x.com"]);
        let sent = notifier.sent.clone();
        let pipeline = BirthdayPipeline::new(
            MockStorage::new(),
            MockConfig::new("birthdays.csv"),
            Box::new(notifier),
        );
        let matches = matches_for(
            &[
                ("john doe", "john@x.com", "1990-01-15"),
                ("jane smith", "jane@x.com", "1985-01-15"),
                ("ann lee", "ann@x.com", "2000-01-15"),
            ],
            ReferenceDate::new(1, 15),
        );

        let summary = pipeline.notify(&matches).await.unwrap();

        assert_eq!(summary.sent(), 2);
        assert_eq!(summary.failed(), 1);
        let failed: Vec<_> = summary.failures().collect();
        assert_eq!(failed[0].email, "jane@x.com");
        assert_eq!(failed[0].error.as_deref(), Some("mailbox unavailable"));

        let sent = sent.lock().await;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].subject, "Happy Birthday John Doe!");
        assert_eq!(sent[0].body, "Dear John, enjoy your day.");
    }

    #[tokio::test]
    async fn test_parallel_notify_keeps_every_outcome_in_order() {
        let notifier = RecordingNotifier::new(&["p3@x.com"]);
        let max_in_flight = notifier.max_in_flight.clone();
        let mut config = MockConfig::new("birthdays.csv");
        config.concurrency = 4;
        let pipeline = BirthdayPipeline::new(MockStorage::new(), config, Box::new(notifier));

        let rows: Vec<(String, String)> = (0..10)
            .map(|i| (format!("Person {}", i), format!("p{}@x.com", i)))
            .collect();
        let borrowed: Vec<(&str, &str, &str)> = rows
            .iter()
            .map(|(n, e)| (n.as_str(), e.as_str(), "1990-06-01"))
            .collect();
        let matches = matches_for(&borrowed, ReferenceDate::new(6, 1));

        let summary = pipeline.notify(&matches).await.unwrap();

        assert_eq!(summary.outcomes.len(), 10);
        assert_eq!(summary.sent(), 9);
        assert_eq!(summary.failed(), 1);
        let emails: Vec<&str> = summary.outcomes.iter().map(|o| o.email.as_str()).collect();
        let expected: Vec<&str> = rows.iter().map(|(_, e)| e.as_str()).collect();
        assert_eq!(emails, expected);
        assert!(max_in_flight.load(Ordering::SeqCst) > 1);
        assert!(max_in_flight.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_unconfigured_transport_fails_each_delivery() {
        let pipeline = BirthdayPipeline::new(
            MockStorage::new(),
            MockConfig::new("birthdays.csv"),
            Box::new(UnconfiguredNotifier::new("SMTP credentials not configured")),
        );
        let matches = matches_for(
            &[("john doe", "john@x.com", "1990-01-15")],
            ReferenceDate::new(1, 15),
        );

        let summary = pipeline.notify(&matches).await.unwrap();
        assert_eq!(summary.sent(), 0);
        assert_eq!(
            summary.outcomes[0].error.as_deref(),
            Some("SMTP credentials not configured")
        );
    }

    #[tokio::test]
    async fn test_summarize_writes_report_only_for_json() {
        let storage = MockStorage::new();
        let pipeline = BirthdayPipeline::new(
            storage.clone(),
            MockConfig::new("birthdays.csv"),
            Box::new(LogNotifier),
        );
        let report = RunReport {
            run_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            reference: ReferenceDate::new(1, 15),
            extracted: 0,
            cleaned: 0,
            rejected: vec![],
            matched: vec![],
            notifications_sent: 0,
            notifications_failed: vec![],
            artifacts: vec![],
        };

        let path = pipeline.summarize(&report).await.unwrap();
        assert_eq!(path.as_deref(), Some("out/run_report.json"));
        let saved: RunReport =
            serde_json::from_slice(&storage.get_file("out/run_report.json").await.unwrap())
                .unwrap();
        assert_eq!(saved, report);

        let mut config = MockConfig::new("birthdays.csv");
        config.output_formats = vec!["csv".to_string()];
        let csv_only = BirthdayPipeline::new(MockStorage::new(), config, Box::new(LogNotifier));
        assert!(csv_only.summarize(&report).await.unwrap().is_none());
    }

    #[test]
    fn test_render_notification_placeholders() {
        let record = clean(vec![RawRecord::new("mary ann smith", "Mary@X.com", "1990-01-15")])
            .records
            .remove(0);
        let n = render_notification(&record, "Hi {first_name}", "{name} <{email}>");
        assert_eq!(n.to, "mary@x.com");
        assert_eq!(n.name, "Mary Ann Smith");
        assert_eq!(n.subject, "Hi Mary");
        assert_eq!(n.body, "Mary Ann Smith <mary@x.com>");
    }
}
