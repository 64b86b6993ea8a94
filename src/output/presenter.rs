use std::io::{self, Write};

use super::config::{OutputConfig, OutputFormat};
use super::types::{Body, Envelope};

pub trait Presenter: Send + Sync {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()>;
}

pub struct JsonPresenter { pub pretty: bool }
impl Presenter for JsonPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        if self.pretty { serde_json::to_writer_pretty(&mut *w, env).map_err(to_io)? } else { serde_json::to_writer(&mut *w, env).map_err(to_io)? }
        writeln!(w)
    }
}

pub struct TextPresenter { pub pretty: bool }
impl Presenter for TextPresenter {
    fn emit(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        match &env.body {
            Body::Result(_) => writeln!(w, "Result: {}", env.op)?,
            Body::Plan(_) => writeln!(w, "Plan: {} (use --apply to execute)", env.op)?,
        }
        if let Some(ms) = env.meta.as_ref().and_then(|m| m.duration_ms) {
            writeln!(w, "took {ms} ms")?;
        }
        if self.pretty {
            serde_json::to_writer_pretty(&mut *w, env.payload()).map_err(to_io)?;
            writeln!(w)?;
        }
        Ok(())
    }
}

pub struct Emitter {
    presenter: Box<dyn Presenter>,
}

impl Emitter {
    pub fn from_config(cfg: OutputConfig) -> Self {
        let presenter: Box<dyn Presenter> = match cfg.format {
            OutputFormat::Json => Box::new(JsonPresenter { pretty: cfg.pretty }),
            OutputFormat::Text => Box::new(TextPresenter { pretty: cfg.pretty }),
        };
        Emitter { presenter }
    }

    pub fn emit(&self, env: &Envelope) -> io::Result<()> {
        let mut out = io::stdout();
        self.emit_to(env, &mut out)?;
        out.flush()
    }

    pub fn emit_to(&self, env: &Envelope, w: &mut dyn Write) -> io::Result<()> {
        self.presenter.emit(env, w)
    }
}

fn to_io(e: serde_json::Error) -> io::Error { io::Error::new(io::ErrorKind::Other, e) }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_presenter_writes_one_line() {
        let env = Envelope::result("catalog", &json!({"categories": 3}), None).unwrap();
        let emitter = Emitter::from_config(OutputConfig { format: OutputFormat::Json, pretty: false });
        let mut buf = Vec::new();
        emitter.emit_to(&env, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        let v: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(v["op"], "catalog");
        assert_eq!(v["result"]["categories"], 3);
    }

    #[test]
    fn text_presenter_marks_plans() {
        let env = Envelope::plan("admin", &json!({"action": "delete"}), None).unwrap();
        let emitter = Emitter::from_config(OutputConfig { format: OutputFormat::Text, pretty: false });
        let mut buf = Vec::new();
        emitter.emit_to(&env, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Plan: admin (use --apply to execute)\n");
    }

    #[test]
    fn text_presenter_shows_duration_and_pretty_payload() {
        use crate::output::types::Meta;

        let meta = Meta { duration_ms: Some(7), ..Default::default() };
        let env = Envelope::result("catalog", &json!({"n": 1}), Some(meta)).unwrap();
        let emitter = Emitter::from_config(OutputConfig { format: OutputFormat::Text, pretty: true });
        let mut buf = Vec::new();
        emitter.emit_to(&env, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Result: catalog\ntook 7 ms\n{\n  \"n\": 1\n}\n");
    }
}
