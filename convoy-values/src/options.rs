use crate::error::{OverrideFlag, ValuesError};
use crate::merge::merge_values;
use crate::reader::SourceReader;
use crate::strvals::{self, ValueTyping};
use convoy_types::Values;
use serde_json::Value;
use tracing::debug;

/// User-supplied value sources for one deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueOptions {
    /// `-f/--values` files or URLs, applied in order.
    pub value_files: Vec<String>,
    /// `--set` strings.
    pub values: Vec<String>,
    /// `--set-string` strings.
    pub string_values: Vec<String>,
    /// `--set-file` strings (`key=path`).
    pub file_values: Vec<String>,
}

/// One source in the order it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer<'a> {
    File(&'a str),
    FileValue(&'a str),
    Inline { raw: &'a str, typing: ValueTyping },
}

impl ValueOptions {
    pub fn is_empty(&self) -> bool {
        self.value_files.is_empty()
            && self.values.is_empty()
            && self.string_values.is_empty()
            && self.file_values.is_empty()
    }

    /// Every source, lowest precedence first.
    pub fn layers(&self) -> Vec<Layer<'_>> {
        let files = self.value_files.iter().map(|f| Layer::File(f));
        let file_values = self.file_values.iter().map(|f| Layer::FileValue(f));
        let strings = self.string_values.iter().map(|raw| Layer::Inline {
            raw,
            typing: ValueTyping::ForcedString,
        });
        let typed = self.values.iter().map(|raw| Layer::Inline {
            raw,
            typing: ValueTyping::Structured,
        });
        files.chain(file_values).chain(strings).chain(typed).collect()
    }
}

/// Resolve all sources into one values tree.
///
/// The result is a pure function of `opts` and what `reader` returns.
pub fn resolve(opts: &ValueOptions, reader: &dyn SourceReader) -> Result<Values, ValuesError> {
    let mut base = Values::new();

    for layer in opts.layers() {
        match layer {
            Layer::File(source) => {
                let values = read_values_file(source, reader)?;
                debug!(source, keys = values.len(), "merging values file");
                merge_values(&mut base, values);
            }
            Layer::FileValue(raw) => apply_file_values(raw, reader, &mut base)?,
            Layer::Inline { raw, typing } => {
                let flag = match typing {
                    ValueTyping::Structured => OverrideFlag::Set,
                    ValueTyping::ForcedString => OverrideFlag::SetString,
                };
                debug!(%flag, input = raw, "applying inline overrides");
                strvals::parse_into(raw, typing, &mut base).map_err(|cause| {
                    ValuesError::Parse {
                        flag,
                        input: raw.to_string(),
                        cause,
                    }
                })?;
            }
        }
    }

    Ok(base)
}

/// Read and parse one YAML values document. An empty document is an empty map.
pub(crate) fn read_values_file(
    source: &str,
    reader: &dyn SourceReader,
) -> Result<Values, ValuesError> {
    let bytes = reader.read(source).map_err(|e| ValuesError::ReadSource {
        origin: source.to_string(),
        message: format!("{e:#}"),
    })?;

    let doc: Value = serde_yaml::from_slice(&bytes).map_err(|e| ValuesError::ParseSource {
        origin: source.to_string(),
        message: e.to_string(),
    })?;

    match doc {
        Value::Null => Ok(Values::new()),
        Value::Object(map) => Ok(map),
        other => Err(ValuesError::ParseSource {
            origin: source.to_string(),
            message: format!("expected a mapping at the top level, found {}", kind(&other)),
        }),
    }
}

fn apply_file_values(
    raw: &str,
    reader: &dyn SourceReader,
    base: &mut Values,
) -> Result<(), ValuesError> {
    let assignments = strvals::parse_assignments(raw).map_err(|cause| ValuesError::Parse {
        flag: OverrideFlag::SetFile,
        input: raw.to_string(),
        cause,
    })?;

    for assignment in assignments {
        let path = assignment.raw_value();
        let bytes = reader.read(&path).map_err(|e| ValuesError::ReadFileValue {
            key: assignment.key.clone(),
            path: path.clone(),
            message: format!("{e:#}"),
        })?;
        debug!(key = assignment.key.as_str(), path = path.as_str(), "applying --set-file");
        let contents = String::from_utf8_lossy(&bytes).into_owned();
        strvals::set_path(base, &assignment.path, Value::String(contents));
    }
    Ok(())
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MapReader(BTreeMap<String, String>);

    impl MapReader {
        fn with(mut self, key: &str, body: &str) -> Self {
            self.0.insert(key.to_string(), body.to_string());
            self
        }
    }

    impl SourceReader for MapReader {
        fn read(&self, source: &str) -> anyhow::Result<Vec<u8>> {
            self.0
                .get(source)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| anyhow::anyhow!("no such source: {source}"))
        }
    }

    #[test]
    fn layers_follow_precedence_order() {
        let opts = ValueOptions {
            value_files: vec!["a.yaml".into()],
            values: vec!["x=1".into()],
            string_values: vec!["y=2".into()],
            file_values: vec!["z=f.txt".into()],
        };
        assert_eq!(
            opts.layers(),
            vec![
                Layer::File("a.yaml"),
                Layer::FileValue("z=f.txt"),
                Layer::Inline {
                    raw: "y=2",
                    typing: ValueTyping::ForcedString
                },
                Layer::Inline {
                    raw: "x=1",
                    typing: ValueTyping::Structured
                },
            ]
        );
    }

    #[test]
    fn empty_options_resolve_to_empty_map() {
        let values = resolve(&ValueOptions::default(), &MapReader::default()).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn set_beats_set_string_beats_set_file_beats_files() {
        let reader = MapReader::default()
            .with("base.yaml", "a: file\nb: file\nc: file\nd: file\n")
            .with("b.txt", "from-set-file");
        let opts = ValueOptions {
            value_files: vec!["base.yaml".into()],
            file_values: vec!["b=b.txt,c=b.txt,d=b.txt".into()],
            string_values: vec!["c=string,d=string".into()],
            values: vec!["d=42".into()],
        };
        let values = resolve(&opts, &reader).unwrap();
        assert_eq!(
            Value::Object(values),
            json!({"a": "file", "b": "from-set-file", "c": "string", "d": 42})
        );
    }

    #[test]
    fn later_files_override_earlier_files() {
        let reader = MapReader::default()
            .with("one.yaml", "image:\n  repo: app\n  tag: v1\n")
            .with("two.yaml", "image:\n  tag: v2\n");
        let opts = ValueOptions {
            value_files: vec!["one.yaml".into(), "two.yaml".into()],
            ..Default::default()
        };
        let values = resolve(&opts, &reader).unwrap();
        assert_eq!(Value::Object(values), json!({"image": {"repo": "app", "tag": "v2"}}));
    }

    #[test]
    fn empty_values_file_is_empty_map() {
        let reader = MapReader::default().with("empty.yaml", "");
        let opts = ValueOptions {
            value_files: vec!["empty.yaml".into()],
            ..Default::default()
        };
        assert!(resolve(&opts, &reader).unwrap().is_empty());
    }

    #[test]
    fn list_document_is_a_parse_error() {
        let reader = MapReader::default().with("list.yaml", "- a\n- b\n");
        let opts = ValueOptions {
            value_files: vec!["list.yaml".into()],
            ..Default::default()
        };
        let err = resolve(&opts, &reader).unwrap_err();
        assert!(matches!(err, ValuesError::ParseSource { .. }));
        assert_eq!(err.origin(), "list.yaml");
        assert!(err.to_string().contains("a list"));
    }

    #[test]
    fn unreadable_file_names_its_origin() {
        let opts = ValueOptions {
            value_files: vec!["missing.yaml".into()],
            ..Default::default()
        };
        let err = resolve(&opts, &MapReader::default()).unwrap_err();
        assert!(matches!(err, ValuesError::ReadSource { .. }));
        assert_eq!(err.origin(), "missing.yaml");
    }

    #[test]
    fn bad_set_syntax_reports_flag() {
        let opts = ValueOptions {
            values: vec!["novalue".into()],
            ..Default::default()
        };
        let err = resolve(&opts, &MapReader::default()).unwrap_err();
        assert!(err.is_syntax());
        assert!(err.to_string().contains("--set "));
    }

    #[test]
    fn unreadable_set_file_is_read_file_value_error() {
        let opts = ValueOptions {
            file_values: vec!["cert=missing.pem".into()],
            ..Default::default()
        };
        let err = resolve(&opts, &MapReader::default()).unwrap_err();
        match err {
            ValuesError::ReadFileValue { key, path, .. } => {
                assert_eq!(key, "cert");
                assert_eq!(path, "missing.pem");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn set_file_contents_are_strings_even_when_numeric() {
        let reader = MapReader::default().with("n.txt", "123");
        let opts = ValueOptions {
            file_values: vec!["tls.count=n.txt".into()],
            ..Default::default()
        };
        let values = resolve(&opts, &reader).unwrap();
        assert_eq!(Value::Object(values), json!({"tls": {"count": "123"}}));
    }
}
