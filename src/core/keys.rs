//! 本地相对路径与远程对象 key 之间的映射
//!
//! key 就是相对于同步目录的路径，目录分隔符统一为 `/`。已有存储桶中的对象
//! 都是按这个规则写入的，改动会导致同一文件被上传到不同的 key。

use std::path::{Path, PathBuf};

/// 相对路径 -> 对象 key。
///
/// 文件名不是合法 UTF-8 时返回 `None`：有损转换会让不同的文件落到同一个 key。
pub fn object_key(relative_path: &Path) -> Option<String> {
    relative_path.to_str().map(|path| path.replace('\\', "/"))
}

/// 对象 key -> 相对路径（按当前平台的分隔符重新拼接）
pub fn relative_path_for_key(key: &str) -> PathBuf {
    key.split('/').filter(|part| !part.is_empty()).collect()
}
