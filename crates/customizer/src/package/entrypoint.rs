//! Generated Python entry points
//!
//! An entry point tries an ordered list of [`AppProvider`]s. Every provider
//! is rendered as a function that returns the application object or
//! `None`; the first non-`None` result wins and every attempt is logged.

use forge_common::layout::ENTRY_POINT_FILE;
use std::fmt::Write;

/// One way of obtaining the application object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppProvider {
    /// `app` attribute of a module importable from the working directory
    RootModule { module: &'static str },
    /// `app` attribute of `<subdir>/<module>.py` in any immediate subdirectory
    Subdirectories { module: &'static str },
    /// Minimal Flask app answering `/` with a fixed message
    Placeholder,
}

impl AppProvider {
    fn function_name(&self) -> String {
        match self {
            AppProvider::RootModule { module } => format!("from_{}_module", module),
            AppProvider::Subdirectories { module } => format!("from_subdirectory_{}", module),
            AppProvider::Placeholder => "placeholder_app".to_string(),
        }
    }

    fn label(&self) -> String {
        match self {
            AppProvider::RootModule { module } => format!("{}.py", module),
            AppProvider::Subdirectories { module } => format!("*/{}.py", module),
            AppProvider::Placeholder => "placeholder".to_string(),
        }
    }

    fn render(&self, file_name: &str, display_name: &str) -> String {
        let function = self.function_name();
        match self {
            AppProvider::RootModule { module } => format!(
                r#"def {function}():
    if importlib.util.find_spec("{module}") is None:
        return None
    loaded = importlib.import_module("{module}")
    return getattr(loaded, "app", None)
"#
            ),
            AppProvider::Subdirectories { module } => format!(
                r#"def {function}():
    for subdir in sorted(d for d in os.listdir(".") if os.path.isdir(d) and not d.startswith(".")):
        candidate = os.path.join(subdir, "{module}.py")
        if not os.path.isfile(candidate):
            continue
        sys.path.insert(0, os.path.abspath(subdir))
        spec = importlib.util.spec_from_file_location(subdir + "_{module}", candidate)
        loaded = importlib.util.module_from_spec(spec)
        spec.loader.exec_module(loaded)
        found = getattr(loaded, "app", None)
        if found is not None:
            logger.info("Found app in subdirectory: %s", subdir)
            return found
        sys.path.pop(0)
    return None
"#
            ),
            AppProvider::Placeholder => format!(
                r#"def {function}():
    from flask import Flask

    fallback = Flask(__name__)

    @fallback.route("/")
    def index():
        return "{display_name} - {file_name} fallback route"

    return fallback
"#,
                display_name = escape_python_str(display_name),
            ),
        }
    }
}

/// Body of a double-quoted Python string literal holding `text`
fn escape_python_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// A generated Python module exposing `app` and `application`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub file_name: &'static str,
    pub providers: Vec<AppProvider>,
}

impl EntryPoint {
    /// `wsgi.py`: the process entry point the hosting platform starts
    pub fn wsgi() -> Self {
        Self {
            file_name: ENTRY_POINT_FILE,
            providers: vec![
                AppProvider::RootModule { module: "app" },
                AppProvider::Subdirectories { module: "app" },
                AppProvider::Placeholder,
            ],
        }
    }

    /// `app.py`: application definition delegating to the template's `main.py`
    pub fn app_module() -> Self {
        Self {
            file_name: "app.py",
            providers: vec![
                AppProvider::RootModule { module: "main" },
                AppProvider::Placeholder,
            ],
        }
    }

    pub fn render(&self, display_name: &str) -> String {
        let stem = self.file_name.trim_end_matches(".py");
        let mut out = format!(
            r#"import importlib
import importlib.util
import logging
import os
import sys

logging.basicConfig(
    level=logging.INFO,
    format="%(asctime)s - %(name)s - %(levelname)s - %(message)s",
    handlers=[logging.StreamHandler(), logging.FileHandler("{stem}.log")],
)
logger = logging.getLogger("{stem}")
logger.info("Starting {file}")
logger.info("Python version: %s", sys.version)
logger.info("Current directory: %s", os.getcwd())

"#,
            stem = stem,
            file = self.file_name
        );

        for provider in &self.providers {
            out.push('\n');
            out.push_str(&provider.render(self.file_name, display_name));
            out.push('\n');
        }

        out.push_str("\nPROVIDERS = [\n");
        for provider in &self.providers {
            // Writing to a String cannot fail
            let _ = writeln!(
                out,
                "    (\"{}\", {}),",
                provider.label(),
                provider.function_name()
            );
        }
        out.push_str(
            r#"]

app = None
for label, provider in PROVIDERS:
    try:
        app = provider()
    except Exception as error:
        logger.error("Provider %s failed: %s", label, error)
        app = None
    if app is not None:
        logger.info("Application provided by %s", label)
        break
    logger.info("No application from %s", label)

if app is None:
    raise RuntimeError("No application could be loaded")

application = app

if __name__ == "__main__":
    port = int(os.environ.get("PORT", 8000))
    logger.info("Starting Flask app on port %s", port)
    app.run(host="0.0.0.0", port=port)
"#,
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wsgi_providers_in_priority_order() {
        let source = EntryPoint::wsgi().render("Acme Links");
        let root = source.find(r#"("app.py", from_app_module)"#).unwrap();
        let subdirs = source.find(r#"("*/app.py", from_subdirectory_app)"#).unwrap();
        let placeholder = source.find(r#"("placeholder", placeholder_app)"#).unwrap();
        assert!(root < subdirs && subdirs < placeholder);
        assert!(source.contains(r#"return "Acme Links - wsgi.py fallback route""#));
        assert!(source.contains("application = app"));
    }

    #[test]
    fn test_app_module_imports_main() {
        let source = EntryPoint::app_module().render("Acme");
        assert!(source.contains(r#"importlib.util.find_spec("main")"#));
        assert!(!source.contains("from_subdirectory"));
        assert!(source.contains(r#"FileHandler("app.log")"#));
    }

    #[test]
    fn test_placeholder_escapes_quotes() {
        let source = EntryPoint::wsgi().render(r#"Say "hi""#);
        assert!(source.contains(r#"return "Say \"hi\" - wsgi.py fallback route""#));
    }

    #[test]
    fn test_placeholder_keeps_string_on_one_line() {
        let source = EntryPoint::wsgi().render("Acme\r\nLinks\t\u{7}\\");
        assert!(source.contains(r#"return "Acme\r\nLinks\t\u0007\\ - wsgi.py fallback route""#));
        let line = source.lines().find(|l| l.contains("fallback route")).unwrap();
        assert!(line.trim_end().ends_with("fallback route\""));
    }
}
