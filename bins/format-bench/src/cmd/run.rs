use std::io::Write;
use std::path::{Path, PathBuf};

use codec_json::JsonFormatSerializer;
use codec_protobuf::ProtobufCodec;
use codec_xml::XmlFormatSerializer;
use format_api::{DataFormat, FormatSerializer, Value};
use tracing::{debug, info};

use super::config::Effective;
use super::dataset;
use super::error::BenchError;
use super::timer::{timed, Timing};
use super::verify;

// ═══════════════════════════════════════════════════════════════
//  Results
// ═══════════════════════════════════════════════════════════════

/// Encoded bytes of one format.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub format: DataFormat,
    pub bytes: Vec<u8>,
}

impl Artifact {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `(named file, comparison file)` written for this format.
    pub fn file_names(&self) -> (&'static str, &'static str) {
        match self.format {
            DataFormat::Json => ("employees.json", "data.json"),
            DataFormat::Xml => ("employees.xml", "data.xml"),
            DataFormat::Protobuf => ("employees.bin", "data.proto"),
        }
    }
}

#[derive(Debug)]
pub struct FormatRun {
    pub artifact: Artifact,
    pub decoded: Value,
    pub encode: Timing,
    pub decode: Timing,
    pub round_trip_ok: bool,
}

#[derive(Debug)]
pub struct RunReport {
    pub runs: Vec<FormatRun>,
    /// Size on disk of each comparison file, in format order.
    pub sizes: Vec<(PathBuf, u64)>,
}

impl RunReport {
    pub fn run(&self, format: DataFormat) -> Option<&FormatRun> {
        self.runs.iter().find(|r| r.artifact.format == format)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Pipeline
// ═══════════════════════════════════════════════════════════════

/// Entry point: run the comparison, report to stdout.
pub fn run(eff: &Effective) -> Result<(), BenchError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let report = execute(eff, &mut out)?;
    for (r, (path, size)) in report.runs.iter().zip(&report.sizes) {
        info!(
            format = %r.artifact.format,
            file = %path.display(),
            size,
            encode_us = r.encode.elapsed.as_micros() as u64,
            decode_us = r.decode.elapsed.as_micros() as u64,
            round_trip_ok = r.round_trip_ok,
            "format summary"
        );
    }
    Ok(())
}

/// Load serializers, build the dataset and benchmark it.
pub fn execute(eff: &Effective, out: &mut dyn Write) -> Result<RunReport, BenchError> {
    let serializers = build_serializers(eff)?;
    let value = dataset::to_value(&dataset::employees());
    bench(&value, &serializers, eff, out)
}

/// JSON, XML, Protobuf, in that order. The schema is loaded here, so a
/// bad schema fails before anything is measured.
pub fn build_serializers(eff: &Effective) -> Result<Vec<Box<dyn FormatSerializer>>, BenchError> {
    let protobuf = ProtobufCodec::load(&eff.protobuf)?;
    Ok(vec![
        Box::new(JsonFormatSerializer::new(eff.json)) as Box<dyn FormatSerializer>,
        Box::new(XmlFormatSerializer::new(eff.xml.clone())?) as Box<dyn FormatSerializer>,
        Box::new(protobuf) as Box<dyn FormatSerializer>,
    ])
}

/// Encode/decode `value` with every serializer, then write and size the
/// artifacts. Nothing touches the filesystem until all encodes succeeded.
pub fn bench(
    value: &Value,
    serializers: &[Box<dyn FormatSerializer>],
    eff: &Effective,
    out: &mut dyn Write,
) -> Result<RunReport, BenchError> {
    let mut runs = Vec::with_capacity(serializers.len());
    for ser in serializers {
        let format = ser.format();
        let label = format.label();

        let (bytes, encode) = timed(format!("{label} encode"), || ser.serialize(value));
        let bytes = bytes?;
        writeln!(out, "{encode}")?;

        let (decoded, decode) = timed(format!("{label} decode"), || ser.deserialize(&bytes));
        let decoded = decoded?;
        writeln!(out, "{decode}")?;

        debug!(format = %format, len = bytes.len(), "encoded and decoded");
        let round_trip_ok = verify::check(format, value, &decoded, &eff.xml.root_element);
        runs.push(FormatRun {
            artifact: Artifact { format, bytes },
            decoded,
            encode,
            decode,
            round_trip_ok,
        });
    }

    let data_files = write_artifacts(&eff.output_dir, &runs)?;
    let sizes = report_sizes(&data_files, out)?;
    let report = RunReport { runs, sizes };

    if let Some(proto) = report.run(DataFormat::Protobuf) {
        let dump = serde_json::to_string_pretty(&proto.decoded).map_err(format_api::FormatError::from)?;
        writeln!(out, "Decoded from Protobuf: {dump}")?;
    }

    Ok(report)
}

/// Write every artifact twice and return the comparison file paths.
fn write_artifacts(dir: &Path, runs: &[FormatRun]) -> Result<Vec<PathBuf>, BenchError> {
    let mut data_files = Vec::with_capacity(runs.len());
    for run in runs {
        let (named, data) = run.artifact.file_names();
        for name in [named, data] {
            let path = dir.join(name);
            std::fs::write(&path, &run.artifact.bytes)
                .map_err(|source| BenchError::Write { path: path.clone(), source })?;
            debug!(path = %path.display(), len = run.artifact.len(), "artifact written");
        }
        data_files.push(dir.join(data));
    }
    Ok(data_files)
}

/// Stat the comparison files and print the size table.
fn report_sizes(files: &[PathBuf], out: &mut dyn Write) -> Result<Vec<(PathBuf, u64)>, BenchError> {
    let mut sizes = Vec::with_capacity(files.len());
    for path in files {
        let meta = std::fs::metadata(path).map_err(|source| BenchError::Stat { path: path.clone(), source })?;
        sizes.push((path.clone(), meta.len()));
    }

    let quoted: Vec<String> = sizes
        .iter()
        .map(|(p, _)| format!("'{}'", p.file_name().unwrap_or_default().to_string_lossy()))
        .collect();
    let width = quoted.iter().map(String::len).max().unwrap_or(0);

    writeln!(out, "Files created successfully:")?;
    for (name, (_, size)) in quoted.iter().zip(&sizes) {
        writeln!(out, "Size of {name:<width$}: {size} bytes")?;
    }
    Ok(sizes)
}
