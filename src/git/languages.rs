//! Static language detection and path filtering tables

use std::path::Path;

/// Languages left out of the persisted composition: configuration, markup and data formats.
pub const NON_CODE_LANGUAGES: &[&str] = &[
    "JSON",
    "YAML",
    "TOML",
    "XML",
    "Markdown",
    "CSV",
    "INI",
    "Text",
    "reStructuredText",
];

const EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "Rust"),
    ("py", "Python"),
    ("pyi", "Python"),
    ("js", "JavaScript"),
    ("mjs", "JavaScript"),
    ("cjs", "JavaScript"),
    ("jsx", "JavaScript"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("go", "Go"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("kts", "Kotlin"),
    ("scala", "Scala"),
    ("c", "C"),
    ("h", "C"),
    ("cc", "C++"),
    ("cpp", "C++"),
    ("cxx", "C++"),
    ("hpp", "C++"),
    ("hh", "C++"),
    ("cs", "C#"),
    ("fs", "F#"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("swift", "Swift"),
    ("m", "Objective-C"),
    ("mm", "Objective-C++"),
    ("dart", "Dart"),
    ("lua", "Lua"),
    ("pl", "Perl"),
    ("pm", "Perl"),
    ("r", "R"),
    ("jl", "Julia"),
    ("ex", "Elixir"),
    ("exs", "Elixir"),
    ("erl", "Erlang"),
    ("hs", "Haskell"),
    ("ml", "OCaml"),
    ("clj", "Clojure"),
    ("elm", "Elm"),
    ("zig", "Zig"),
    ("nim", "Nim"),
    ("sh", "Shell"),
    ("bash", "Shell"),
    ("zsh", "Shell"),
    ("fish", "Shell"),
    ("ps1", "PowerShell"),
    ("sql", "SQL"),
    ("html", "HTML"),
    ("htm", "HTML"),
    ("css", "CSS"),
    ("scss", "SCSS"),
    ("sass", "Sass"),
    ("less", "Less"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("proto", "Protocol Buffers"),
    ("tf", "HCL"),
    ("hcl", "HCL"),
    ("json", "JSON"),
    ("yaml", "YAML"),
    ("yml", "YAML"),
    ("toml", "TOML"),
    ("xml", "XML"),
    ("md", "Markdown"),
    ("markdown", "Markdown"),
    ("csv", "CSV"),
    ("ini", "INI"),
    ("cfg", "INI"),
    ("txt", "Text"),
    ("rst", "reStructuredText"),
];

const FILENAMES: &[(&str, &str)] = &[
    ("Dockerfile", "Dockerfile"),
    ("Makefile", "Makefile"),
    ("GNUmakefile", "Makefile"),
    ("CMakeLists.txt", "CMake"),
    ("Rakefile", "Ruby"),
    ("Gemfile", "Ruby"),
    ("Jenkinsfile", "Groovy"),
];

/// Directory segments holding dependencies or build output.
const DENIED_DIRECTORIES: &[&str] = &[
    "node_modules",
    "vendor",
    "bower_components",
    ".venv",
    "venv",
    "__pycache__",
    "dist",
    "build",
    "target",
    "out",
    ".next",
    ".nuxt",
    "coverage",
];

const DENIED_FILENAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "Gemfile.lock",
    "poetry.lock",
    "composer.lock",
    "go.sum",
];

const DENIED_SUFFIXES: &[&str] = &[".lock", ".min.js", ".min.css", ".map", ".log"];

/// Language for a path, by exact filename first and then by extension.
pub fn detect_language(path: &str) -> Option<&'static str> {
    let path = Path::new(path);
    let file_name = path.file_name()?.to_str()?;

    if let Some((_, language)) = FILENAMES.iter().find(|(name, _)| *name == file_name) {
        return Some(*language);
    }

    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, language)| *language)
}

/// Whether a tracked path is generated or vendored content to leave out of the file tree.
pub fn is_excluded_path(path: &str) -> bool {
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_some() {
            if DENIED_DIRECTORIES.contains(&segment) {
                return true;
            }
            continue;
        }

        // last segment: the file name
        let lowered = segment.to_ascii_lowercase();
        return DENIED_FILENAMES.contains(&segment)
            || DENIED_SUFFIXES.iter().any(|suffix| lowered.ends_with(suffix));
    }
    false
}

pub fn is_non_code_language(language: &str) -> bool {
    NON_CODE_LANGUAGES.contains(&language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_by_extension_and_filename() {
        assert_eq!(detect_language("src/main.rs"), Some("Rust"));
        assert_eq!(detect_language("web/App.TSX"), Some("TypeScript"));
        assert_eq!(detect_language("docker/Dockerfile"), Some("Dockerfile"));
        assert_eq!(detect_language("CMakeLists.txt"), Some("CMake"));
        assert_eq!(detect_language("notes.txt"), Some("Text"));
        assert_eq!(detect_language("LICENSE"), None);
        assert_eq!(detect_language("image.png"), None);
    }

    #[test]
    fn test_excluded_paths() {
        assert!(is_excluded_path("node_modules/react/index.js"));
        assert!(is_excluded_path("web/dist/app.js"));
        assert!(is_excluded_path("Cargo.lock"));
        assert!(is_excluded_path("static/app.min.js"));
        assert!(is_excluded_path("static/app.js.map"));
        assert!(is_excluded_path("logs/server.log"));
        assert!(is_excluded_path("deps/yarn.lock"));

        assert!(!is_excluded_path("src/build.rs"));
        assert!(!is_excluded_path("src/lib.rs"));
        assert!(!is_excluded_path("docs/distribution.md"));
    }

    #[test]
    fn test_non_code_languages() {
        assert!(is_non_code_language("JSON"));
        assert!(is_non_code_language("Markdown"));
        assert!(!is_non_code_language("Rust"));
    }
}
