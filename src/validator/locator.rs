//! Validator discovery
//!
//! Candidates are probed in order:
//! 1. An explicitly configured jar or executable
//! 2. Extra search patterns from the config file
//! 3. Built-in jar locations (only when a Java runtime was found)
//! 4. Built-in executable locations
//!
//! A candidate wins when its file exists and `--version` exits with status
//! 0. Every failure is logged and the next candidate is tried; callers only
//! learn whether something was found.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use directories::BaseDirs;
use globset::GlobBuilder;

use super::process::run_with_timeout;
use crate::domain::ToolDescriptor;
use crate::storage::Config;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Operating system family; the only thing discovery branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Mac,
    Other,
}

impl OsFamily {
    pub fn current() -> Self {
        if cfg!(windows) {
            OsFamily::Windows
        } else if cfg!(target_os = "macos") {
            OsFamily::Mac
        } else {
            OsFamily::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::Mac => "mac",
            OsFamily::Other => "other",
        }
    }
}

/// A validator that answered its version probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub tool: ToolDescriptor,
    pub version: String,
}

/// Runtime commands probed on PATH
const PATH_RUNTIMES: &[&str] = &["java", "java.exe"];

fn windows_runtime_patterns() -> Vec<String> {
    vec![
        r"C:\Program Files\OpenJDK\*\bin\java.exe".to_string(),
        r"C:\Program Files\Java\*\bin\java.exe".to_string(),
        r"C:\ProgramData\chocolatey\lib\openjdk*\tools\*\bin\java.exe".to_string(),
    ]
}

/// Built-in jar locations, most specific first
pub fn jar_patterns(os: OsFamily, home: Option<&Path>) -> Vec<String> {
    let in_home = |rel: &str| home.map(|h| h.join(rel).to_string_lossy().into_owned());

    match os {
        OsFamily::Windows => [
            Some(r"C:\ProgramData\chocolatey\lib\epubcheck\tools\epubcheck-*\epubcheck.jar".to_string()),
            Some(r"C:\Program Files\epubcheck\epubcheck.jar".to_string()),
            in_home(r"Desktop\epubcheck.jar"),
            in_home(r"Downloads\epubcheck.jar"),
            Some("epubcheck.jar".to_string()),
        ]
        .into_iter()
        .flatten()
        .collect(),
        OsFamily::Mac | OsFamily::Other => [
            Some("/usr/local/bin/epubcheck.jar".to_string()),
            Some("/usr/local/lib/epubcheck/epubcheck.jar".to_string()),
            Some("/usr/local/lib/epubcheck-*/epubcheck.jar".to_string()),
            Some("/opt/homebrew/lib/epubcheck/epubcheck.jar".to_string()),
            Some("/opt/homebrew/bin/epubcheck.jar".to_string()),
            Some("/usr/local/Cellar/epubcheck/*/libexec/epubcheck.jar".to_string()),
            Some("/opt/homebrew/Cellar/epubcheck/*/libexec/epubcheck.jar".to_string()),
            in_home("Desktop/epubcheck.jar"),
            in_home("Downloads/epubcheck.jar"),
            in_home("Applications/epubcheck.jar"),
            Some("epubcheck.jar".to_string()),
        ]
        .into_iter()
        .flatten()
        .collect(),
    }
}

/// Built-in native launcher locations
pub fn executable_patterns(os: OsFamily) -> Vec<String> {
    let patterns: &[&str] = match os {
        OsFamily::Windows => &[r"C:\ProgramData\chocolatey\bin\epubcheck.exe"],
        OsFamily::Mac | OsFamily::Other => &[
            "/usr/local/bin/epubcheck",
            "/usr/bin/epubcheck",
            "/opt/homebrew/bin/epubcheck",
            "/usr/local/Cellar/epubcheck/*/bin/epubcheck",
            "/opt/homebrew/Cellar/epubcheck/*/bin/epubcheck",
        ],
    };
    patterns.iter().map(|p| p.to_string()).collect()
}

fn is_glob(part: &str) -> bool {
    part.contains(['*', '?', '['])
}

/// Expands a path pattern whose components may contain globs
///
/// Matches are returned per component in lexicographic order. Only
/// existing paths are returned.
pub fn expand_pattern(pattern: &str, case_insensitive: bool) -> Vec<PathBuf> {
    let mut current = vec![PathBuf::new()];

    for component in Path::new(pattern).components() {
        let part = component.as_os_str().to_string_lossy();

        if !is_glob(&part) {
            for path in &mut current {
                path.push(component.as_os_str());
            }
            continue;
        }

        let matcher = match GlobBuilder::new(&part)
            .case_insensitive(case_insensitive)
            .build()
        {
            Ok(glob) => glob.compile_matcher(),
            Err(e) => {
                log::debug!("Invalid pattern {}: {}", pattern, e);
                return Vec::new();
            }
        };

        let mut next = Vec::new();
        for dir in &current {
            let read_from = if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir.as_path()
            };

            let Ok(entries) = fs::read_dir(read_from) else {
                continue;
            };

            let mut matched: Vec<PathBuf> = entries
                .flatten()
                .map(|entry| entry.file_name())
                .filter(|name| matcher.is_match(name))
                .map(|name| dir.join(name))
                .collect();
            matched.sort();
            next.extend(matched);
        }

        current = next;
        if current.is_empty() {
            break;
        }
    }

    current.retain(|path| !path.as_os_str().is_empty() && path.exists());
    current
}

fn expand_home(pattern: &str, home: Option<&Path>) -> String {
    match (pattern.strip_prefix("~/").or_else(|| pattern.strip_prefix(r"~\")), home) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().into_owned(),
        _ => pattern.to_string(),
    }
}

fn is_jar(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("jar"))
        .unwrap_or(false)
}

/// Finds a working validator installation
#[derive(Debug, Clone)]
pub struct ToolLocator {
    os: OsFamily,
    home: Option<PathBuf>,
    probe_timeout: Duration,
    tool: Option<PathBuf>,
    runtime: Option<PathBuf>,
    search_paths: Vec<String>,
    builtin_paths: bool,
}

impl ToolLocator {
    /// Creates a locator using the built-in locations for `os`
    pub fn new(os: OsFamily) -> Self {
        Self {
            os,
            home: BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            tool: None,
            runtime: None,
            search_paths: Vec::new(),
            builtin_paths: true,
        }
    }

    /// Creates a locator for this machine from configuration
    pub fn from_config(config: &Config) -> Self {
        let mut locator = Self::new(OsFamily::current())
            .with_probe_timeout(config.probe_timeout())
            .with_search_paths(config.search_paths.clone());

        if let Some(tool) = &config.epubcheck {
            locator = locator.with_tool(tool);
        }
        if let Some(runtime) = &config.java {
            locator = locator.with_runtime(runtime);
        }
        locator
    }

    /// Probes this jar or executable before anything else
    pub fn with_tool(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool = Some(path.into());
        self
    }

    /// Probes this Java runtime before the PATH
    pub fn with_runtime(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime = Some(path.into());
        self
    }

    pub fn with_search_paths(mut self, patterns: Vec<String>) -> Self {
        self.search_paths = patterns;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Skips the built-in locations and the PATH runtime probe
    pub fn without_builtin_paths(mut self) -> Self {
        self.builtin_paths = false;
        self
    }

    pub fn os(&self) -> OsFamily {
        self.os
    }

    fn case_insensitive(&self) -> bool {
        self.os == OsFamily::Windows
    }

    /// Finds a Java runtime that answers `-version`
    pub fn find_runtime(&self) -> Option<PathBuf> {
        let mut candidates: Vec<PathBuf> = self.runtime.iter().cloned().collect();

        if self.builtin_paths {
            candidates.extend(PATH_RUNTIMES.iter().map(PathBuf::from));

            if self.os == OsFamily::Windows {
                for pattern in windows_runtime_patterns() {
                    candidates.extend(expand_pattern(&pattern, true));
                }
            }
        }

        candidates.into_iter().find(|runtime| {
            let mut cmd = Command::new(runtime);
            cmd.arg("-version");
            match run_with_timeout(&mut cmd, self.probe_timeout) {
                Ok(output) if output.success => true,
                Ok(output) => {
                    log::debug!("{} -version exited with {:?}", runtime.display(), output.exit_code);
                    false
                }
                Err(e) => {
                    log::debug!("Runtime probe failed: {}", e);
                    false
                }
            }
        })
    }

    /// Candidate descriptors in probe order
    ///
    /// Jar candidates are dropped when `runtime` is None.
    pub fn candidates(&self, runtime: Option<&Path>) -> Vec<ToolDescriptor> {
        let ci = self.case_insensitive();
        let describe = |path: PathBuf| -> Option<ToolDescriptor> {
            if is_jar(&path) {
                match runtime {
                    Some(runtime) => Some(ToolDescriptor::jar(path, runtime)),
                    None => {
                        log::debug!("Skipping {}: no Java runtime", path.display());
                        None
                    }
                }
            } else {
                Some(ToolDescriptor::executable(path))
            }
        };

        let mut candidates = Vec::new();

        if let Some(tool) = &self.tool {
            candidates.extend(describe(tool.clone()));
        }

        for pattern in &self.search_paths {
            let pattern = expand_home(pattern, self.home.as_deref());
            candidates.extend(expand_pattern(&pattern, ci).into_iter().filter_map(&describe));
        }

        if self.builtin_paths {
            if let Some(runtime) = runtime {
                for pattern in jar_patterns(self.os, self.home.as_deref()) {
                    candidates.extend(
                        expand_pattern(&pattern, ci)
                            .into_iter()
                            .map(|path| ToolDescriptor::jar(path, runtime)),
                    );
                }
            }

            for pattern in executable_patterns(self.os) {
                candidates.extend(
                    expand_pattern(&pattern, ci)
                        .into_iter()
                        .map(ToolDescriptor::executable),
                );
            }
        }

        candidates
    }

    fn needs_runtime(&self) -> bool {
        self.builtin_paths
            || self.tool.as_deref().map(is_jar).unwrap_or(false)
            || self.search_paths.iter().any(|p| p.to_ascii_lowercase().ends_with(".jar"))
    }

    /// Runs the version probe; returns the reported version on success
    pub fn probe(&self, tool: &ToolDescriptor) -> Option<String> {
        if !tool.path.is_file() {
            log::debug!("{} does not exist", tool.path.display());
            return None;
        }

        match run_with_timeout(&mut tool.version_command(), self.probe_timeout) {
            Ok(output) if output.success => Some(output.first_line_of_output()),
            Ok(output) => {
                log::debug!(
                    "{} --version exited with {:?}: {}",
                    tool.path.display(),
                    output.exit_code,
                    output.stderr.trim()
                );
                None
            }
            Err(e) => {
                log::debug!("Error running epubcheck: {}", e);
                None
            }
        }
    }

    /// Returns the first candidate that exists and answers its version probe
    pub fn locate(&self) -> Option<Located> {
        let runtime = if self.needs_runtime() {
            self.find_runtime()
        } else {
            None
        };

        self.candidates(runtime.as_deref())
            .into_iter()
            .find_map(|tool| {
                log::debug!("Probing {} ({})", tool.path.display(), tool.kind.as_str());
                self.probe(&tool).map(|version| Located { tool, version })
            })
    }
}

/// Installation guide text, branching only on OS family
pub fn installation_guide(os: OsFamily, java_installed: bool) -> Vec<String> {
    let mut lines = Vec::new();

    if java_installed {
        lines.push("Java is installed.".to_string());
    } else {
        lines.push("Java is not installed!".to_string());
        lines.push(match os {
            OsFamily::Mac => "Install Java: brew install openjdk".to_string(),
            _ => "Install Java: choco install openjdk".to_string(),
        });
        lines.push(String::new());
    }

    lines.push("epubcheck installation methods:".to_string());
    let methods: &[&str] = match os {
        OsFamily::Mac => &[
            "1. brew install epubcheck",
            "2. https://github.com/w3c/epubcheck/releases",
            "3. Save epubcheck.jar to Desktop",
        ],
        _ => &[
            "1. https://github.com/w3c/epubcheck/releases",
            "2. Save epubcheck.jar to Desktop",
            "3. Or use: choco install epubcheck",
        ],
    };
    lines.extend(methods.iter().map(|m| m.to_string()));

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn jar_patterns_include_home_locations() {
        let patterns = jar_patterns(OsFamily::Mac, Some(Path::new("/Users/reader")));

        assert_eq!(patterns[0], "/usr/local/bin/epubcheck.jar");
        assert!(patterns.contains(&"/Users/reader/Desktop/epubcheck.jar".to_string()));
        assert!(patterns.contains(&"/Users/reader/Applications/epubcheck.jar".to_string()));
        assert_eq!(patterns.last().map(String::as_str), Some("epubcheck.jar"));
    }

    #[test]
    fn jar_patterns_without_home() {
        let patterns = jar_patterns(OsFamily::Windows, None);
        assert_eq!(patterns.len(), 3);
    }

    #[test]
    fn executable_patterns_per_os() {
        assert_eq!(
            executable_patterns(OsFamily::Windows),
            vec![r"C:\ProgramData\chocolatey\bin\epubcheck.exe"]
        );
        assert!(executable_patterns(OsFamily::Other).contains(&"/usr/bin/epubcheck".to_string()));
    }

    #[test]
    fn guide_for_mac_suggests_homebrew() {
        let guide = installation_guide(OsFamily::Mac, false);

        assert_eq!(guide[0], "Java is not installed!");
        assert_eq!(guide[1], "Install Java: brew install openjdk");
        assert!(guide.contains(&"1. brew install epubcheck".to_string()));
    }

    #[test]
    fn guide_for_other_suggests_releases() {
        let guide = installation_guide(OsFamily::Windows, true);

        assert_eq!(guide[0], "Java is installed.");
        assert_eq!(guide[2], "1. https://github.com/w3c/epubcheck/releases");
        assert_eq!(guide[4], "3. Or use: choco install epubcheck");
    }

    #[test]
    fn expand_pattern_matches_in_order() {
        let dir = TempDir::new().unwrap();
        for version in ["epubcheck-5.1.0", "epubcheck-4.2.6", "other"] {
            fs::create_dir_all(dir.path().join(version)).unwrap();
            fs::write(dir.path().join(version).join("epubcheck.jar"), b"jar").unwrap();
        }

        let pattern = format!("{}/epubcheck-*/epubcheck.jar", dir.path().display());
        let matches = expand_pattern(&pattern, false);

        assert_eq!(
            matches,
            vec![
                dir.path().join("epubcheck-4.2.6").join("epubcheck.jar"),
                dir.path().join("epubcheck-5.1.0").join("epubcheck.jar"),
            ]
        );
    }

    #[test]
    fn expand_pattern_without_glob_checks_existence() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("epubcheck.jar");

        assert!(expand_pattern(&jar.to_string_lossy(), false).is_empty());
        fs::write(&jar, b"jar").unwrap();
        assert_eq!(expand_pattern(&jar.to_string_lossy(), false), vec![jar]);
    }

    #[test]
    fn expand_home_prefix() {
        let home = Path::new("/home/reader");
        assert_eq!(
            expand_home("~/tools/epubcheck.jar", Some(home)),
            "/home/reader/tools/epubcheck.jar"
        );
        assert_eq!(expand_home("/opt/epubcheck", Some(home)), "/opt/epubcheck");
        assert_eq!(expand_home("~/x", None), "~/x");
    }

    #[test]
    fn jars_need_a_runtime() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("epubcheck.jar");
        fs::write(&jar, b"jar").unwrap();

        let locator = ToolLocator::new(OsFamily::Other)
            .without_builtin_paths()
            .with_tool(&jar);

        assert!(locator.candidates(None).is_empty());
        assert_eq!(
            locator.candidates(Some(Path::new("java"))),
            vec![ToolDescriptor::jar(&jar, "java")]
        );
    }

    #[test]
    fn nothing_found_without_candidates() {
        let locator = ToolLocator::new(OsFamily::Other).without_builtin_paths();
        assert!(locator.locate().is_none());
    }

    #[cfg(unix)]
    mod probing {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn finds_working_executable() {
            let dir = TempDir::new().unwrap();
            let tool = script(dir.path(), "epubcheck", "echo 'EPUBCheck v5.1.0'");

            let located = ToolLocator::new(OsFamily::Other)
                .without_builtin_paths()
                .with_tool(&tool)
                .locate()
                .unwrap();

            assert_eq!(located.tool, ToolDescriptor::executable(&tool));
            assert_eq!(located.version, "EPUBCheck v5.1.0");
        }

        #[test]
        fn broken_candidate_is_skipped() {
            let dir = TempDir::new().unwrap();
            fs::create_dir_all(dir.path().join("a")).unwrap();
            fs::create_dir_all(dir.path().join("b")).unwrap();
            script(&dir.path().join("a"), "epubcheck", "echo broken 1>&2; exit 1");
            let good = script(&dir.path().join("b"), "epubcheck", "echo 'EPUBCheck v4.2.6'");

            let located = ToolLocator::new(OsFamily::Other)
                .without_builtin_paths()
                .with_search_paths(vec![format!("{}/*/epubcheck", dir.path().display())])
                .locate()
                .unwrap();

            assert_eq!(located.tool.path, good);
        }

        #[test]
        fn search_paths_expand_from_home() {
            let home = TempDir::new().unwrap();
            fs::create_dir_all(home.path().join("tools")).unwrap();
            let tool = script(&home.path().join("tools"), "epubcheck", "echo 'EPUBCheck v5.1.0'");

            let located = ToolLocator::new(OsFamily::Other)
                .without_builtin_paths()
                .with_home(Some(home.path().to_path_buf()))
                .with_search_paths(vec!["~/tools/epubcheck".to_string()])
                .locate()
                .unwrap();

            assert_eq!(located.tool.path, tool);
        }

        #[test]
        fn hanging_candidate_times_out() {
            let dir = TempDir::new().unwrap();
            let tool = script(dir.path(), "epubcheck", "exec sleep 5");

            let located = ToolLocator::new(OsFamily::Other)
                .without_builtin_paths()
                .with_tool(&tool)
                .with_probe_timeout(Duration::from_millis(200))
                .locate();

            assert!(located.is_none());
        }

        #[test]
        fn jar_runs_through_configured_runtime() {
            let dir = TempDir::new().unwrap();
            let java = script(
                dir.path(),
                "java",
                r#"if [ "$1" = "-version" ]; then echo 'openjdk 17' 1>&2; exit 0; fi
if [ "$1" = "-jar" ] && [ "$3" = "--version" ]; then echo 'EPUBCheck v5.1.0'; exit 0; fi
exit 1"#,
            );
            let jar = dir.path().join("epubcheck.jar");
            fs::write(&jar, b"jar").unwrap();

            let locator = ToolLocator::new(OsFamily::Other)
                .without_builtin_paths()
                .with_runtime(&java)
                .with_tool(&jar);

            assert_eq!(locator.find_runtime(), Some(java.clone()));

            let located = locator.locate().unwrap();
            assert_eq!(located.tool, ToolDescriptor::jar(&jar, &java));
            assert_eq!(located.version, "EPUBCheck v5.1.0");
        }
    }
}
