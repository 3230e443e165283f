use std::path::{Path, PathBuf};

use clap::Args;
use codec_json::JsonFormatConfig;
use codec_protobuf::ProtobufFormatConfig;
use codec_xml::XmlFormatConfig;
use serde::Deserialize;
use tracing::{info, warn};

use super::error::BenchError;

const DEFAULT_SCHEMA: &str = "employee.proto";
const DEFAULT_MESSAGE_TYPE: &str = "Employees";

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub output_dir: Option<PathBuf>,
    pub json: Option<JsonFormatConfig>,
    pub xml: Option<XmlFormatConfig>,
    pub protobuf: Option<ProtobufFormatConfig>,
}

pub fn load_config(path: &str) -> Result<Config, BenchError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| BenchError::Config(format!("cannot read config {path}: {e}")))?;
    toml::from_str(&content).map_err(|e| BenchError::Config(format!("bad config {path}: {e}")))
}

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug, Default)]
pub struct BenchArgs {
    /// Path to format-bench.toml (a missing file means defaults)
    #[arg(long, default_value = "format-bench.toml", env = "FORMAT_BENCH_CONFIG")]
    pub config: String,

    /// Protobuf schema: .proto source or a compiled descriptor set
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Fully-qualified protobuf message type of the employee list
    #[arg(long)]
    pub message_type: Option<String>,

    /// Directory receiving employees.* and data.*
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Synthetic XML root element
    #[arg(long)]
    pub root_element: Option<String>,

    /// XML indentation in spaces (0 = single line)
    #[arg(long)]
    pub indent: Option<usize>,

    /// Write JSON without whitespace
    #[arg(long)]
    pub compact_json: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Effective: merged config
// ═══════════════════════════════════════════════════════════════

/// Final configuration after merging: defaults < format-bench.toml < env/CLI
#[derive(Debug, Clone)]
pub struct Effective {
    pub output_dir: PathBuf,
    pub json: JsonFormatConfig,
    pub xml: XmlFormatConfig,
    pub protobuf: ProtobufFormatConfig,
}

impl Effective {
    pub fn new(args: &BenchArgs) -> Result<Self, BenchError> {
        let (cfg, loaded) = match load_config(&args.config) {
            Ok(c) => (c, true),
            Err(e) => {
                if Path::new(&args.config).exists() {
                    return Err(e);
                }
                (Config::default(), false)
            }
        };
        let eff = Self::merge(args, cfg)?;
        eff.log(&args.config, loaded);
        Ok(eff)
    }

    /// Settings of a run with no flags and no config file.
    pub fn base() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            json: JsonFormatConfig::default(),
            xml: XmlFormatConfig::default(),
            protobuf: ProtobufFormatConfig {
                schema: PathBuf::from(DEFAULT_SCHEMA),
                message_type: DEFAULT_MESSAGE_TYPE.to_string(),
            },
        }
    }

    /// True when the output is not affected by flags, env or the config file.
    pub fn is_base(&self) -> bool {
        let base = Self::base();
        self.json == base.json && self.xml == base.xml && self.protobuf == base.protobuf
    }

    fn log(&self, config: &str, loaded: bool) {
        let source = if loaded { config } else { "<none>" };
        info!(
            config = source,
            output_dir = %self.output_dir.display(),
            json_pretty = self.json.pretty,
            xml_root = %self.xml.root_element,
            xml_indent = self.xml.indent,
            schema = %self.protobuf.schema.display(),
            message_type = %self.protobuf.message_type,
            "effective config"
        );
        if !self.is_base() {
            warn!("encoder settings differ from the defaults, sizes will not match a default run");
        }
    }

    fn merge(args: &BenchArgs, cfg: Config) -> Result<Self, BenchError> {
        let mut json = cfg.json.unwrap_or_default();
        if args.compact_json {
            json.pretty = false;
        }

        let mut xml = cfg.xml.unwrap_or_default();
        if let Some(root) = &args.root_element {
            xml.root_element = root.clone();
        }
        if let Some(indent) = args.indent {
            xml.indent = indent;
        }
        if xml.root_element.is_empty() {
            return Err(BenchError::Config("xml root element must not be empty".into()));
        }

        let mut protobuf = cfg.protobuf.unwrap_or_default();
        if let Some(schema) = &args.schema {
            protobuf.schema = schema.clone();
        }
        if protobuf.schema.as_os_str().is_empty() {
            protobuf.schema = PathBuf::from(DEFAULT_SCHEMA);
        }
        if let Some(message_type) = &args.message_type {
            protobuf.message_type = message_type.clone();
        }
        if protobuf.message_type.is_empty() {
            protobuf.message_type = DEFAULT_MESSAGE_TYPE.to_string();
        }

        Ok(Self {
            output_dir: args.output_dir.clone().or(cfg.output_dir).unwrap_or_else(|| PathBuf::from(".")),
            json,
            xml,
            protobuf,
        })
    }
}
