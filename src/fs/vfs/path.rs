//! Caminhos: normalização contra o cwd e roteamento por prefixo.

use alloc::string::String;
use alloc::vec::Vec;

/// Destino de um caminho absoluto normalizado.
///
/// O `&str` carregado é o caminho dentro do sistema de arquivos de
/// destino, sempre começando com `/`, ou o nome do arquivo em `/proc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// `""` é o próprio diretório `/proc`
    Proc(&'a str),
    Disk(usize, &'a str),
    Ram(&'a str),
}

/// Resolve `path` contra `cwd`, removendo `.`, `..` e barras repetidas.
///
/// `..` na raiz fica na raiz.
pub fn normalize(cwd: &str, path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let base = if path.starts_with('/') { "" } else { cwd };
    for comp in base.split('/').chain(path.split('/')) {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(comp),
        }
    }

    let mut out = String::with_capacity(path.len() + 1);
    for comp in &parts {
        out.push('/');
        out.push_str(comp);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// `path` é `prefix` ou está abaixo dele.
fn strip_mount<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    match rest {
        "" => Some("/"),
        _ if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

/// Roteia um caminho já normalizado.
pub fn route(path: &str) -> Route<'_> {
    if let Some(rest) = strip_mount(path, "/proc") {
        return Route::Proc(rest.trim_start_matches('/'));
    }
    if let Some(rest) = strip_mount(path, "/disk2") {
        return Route::Disk(1, rest);
    }
    if let Some(rest) = strip_mount(path, "/disk") {
        return Route::Disk(0, rest);
    }
    Route::Ram(path)
}

pub fn mount_point(drive: usize) -> &'static str {
    match drive {
        0 => "/disk",
        _ => "/disk2",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_dots_and_slashes() {
        assert_eq!(normalize("/", "/a//b/./c"), "/a/b/c");
        assert_eq!(normalize("/", "/a/b/../c"), "/a/c");
        assert_eq!(normalize("/", "/../../x"), "/x");
        assert_eq!(normalize("/", ""), "/");
        assert_eq!(normalize("/", "///"), "/");
    }

    #[test]
    fn relative_paths_use_cwd() {
        assert_eq!(normalize("/tmp", "a"), "/tmp/a");
        assert_eq!(normalize("/tmp/sub/", "../b"), "/tmp/b");
        assert_eq!(normalize("/disk", "."), "/disk");
        assert_eq!(normalize("/tmp", "/abs"), "/abs");
    }

    #[test]
    fn routes_by_prefix() {
        assert_eq!(route("/proc"), Route::Proc(""));
        assert_eq!(route("/proc/tasks"), Route::Proc("tasks"));
        assert_eq!(route("/disk"), Route::Disk(0, "/"));
        assert_eq!(route("/disk/a/b"), Route::Disk(0, "/a/b"));
        assert_eq!(route("/disk2/x"), Route::Disk(1, "/x"));
        assert_eq!(route("/tmp/a"), Route::Ram("/tmp/a"));
        assert_eq!(route("/"), Route::Ram("/"));
    }

    #[test]
    fn prefix_must_end_at_component() {
        assert_eq!(route("/diskette"), Route::Ram("/diskette"));
        assert_eq!(route("/disk3"), Route::Ram("/disk3"));
        assert_eq!(route("/process"), Route::Ram("/process"));
    }
}
