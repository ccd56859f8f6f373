// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Structured logging: one JSON object per record on stderr, so stdout only carries the
//! verification report.

use serde::Serialize;
use std::{
    collections::HashMap,
    io::{self, Write},
    sync::Once,
};

pub struct Logger;

#[derive(Serialize)]
struct LogEntry {
    message: String,
    level: String,
    #[serde(flatten)]
    fields: HashMap<String, String>,
}

pub static LOGGER: Logger = Logger;

/// Initialize the logger. Only the first call has any effect.
pub fn init(level: Option<&str>) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let level = level
            .and_then(|l| l.parse().ok())
            .unwrap_or(log::Level::Info);
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level.to_level_filter());
        }
    });
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        struct Visitor<'m>(&'m mut HashMap<String, String>);
        impl<'kvs> log::kv::VisitSource<'kvs> for Visitor<'_> {
            fn visit_pair(
                &mut self,
                key: log::kv::Key<'kvs>,
                value: log::kv::Value<'kvs>,
            ) -> Result<(), log::kv::Error> {
                self.0.insert(key.as_str().to_owned(), value.to_string());
                Ok(())
            }
        }

        if !self.enabled(record.metadata()) {
            return;
        }
        let mut fields = HashMap::new();
        if let (Some(module), Some(file), Some(line)) =
            (record.module_path(), record.file(), record.line())
        {
            fields.insert("location".to_owned(), format!("{module}::{file}:{line}"));
        }
        // Visiting only fails if the visitor does, and ours never does.
        let _ = record.key_values().visit(&mut Visitor(&mut fields));
        let entry = LogEntry {
            message: format!("{}", record.args()),
            level: record.level().to_string(),
            fields,
        };
        if let Ok(line) = serde_json::to_string(&entry) {
            let _ = writeln!(io::stderr().lock(), "{line}");
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}
