//! File name helpers.

use std::path::{Path, PathBuf};

/// Replace characters that cannot appear in a file name with their full
/// width forms and drop line breaks. Used for names derived from bones,
/// materials and rigid bodies.
pub fn file_path_string(src: &str) -> String {
    src.chars()
        .filter(|&c| c != '\n' && c != '\r')
        .map(|c| match c {
            '\\' => '＼',
            '/' => '／',
            ':' => '：',
            '*' => '＊',
            '?' => '？',
            '"' => '”',
            '<' => '＜',
            '>' => '＞',
            '|' => '｜',
            c => c,
        })
        .collect()
}

/// Resolve a texture path stored in a PMX file against the model directory.
///
/// PMX files written on Windows separate directories with `\`.
pub fn texture_path<P: AsRef<Path>>(model_dir: P, texture: &str) -> PathBuf {
    texture
        .split(|c| c == '\\' || c == '/')
        .filter(|s| !s.is_empty())
        .fold(model_dir.as_ref().to_path_buf(), |path, s| path.join(s))
}
