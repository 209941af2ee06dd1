//! 同步错误分类

use thiserror::Error;

/// 同步过程中可能出现的错误
#[derive(Debug, Error)]
pub enum SyncError {
    /// 源目录或存储桶配置无效，同步无法开始
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 无法列出/统计远程对象（认证失败、存储桶不存在、网络问题）
    #[error("failed to enumerate bucket objects: {0}")]
    Enumeration(String),

    /// 单个文件上传失败，同步会继续处理下一个文件
    #[error("failed to upload {key}: {message}")]
    Upload { key: String, message: String },
}

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// 将适配层的 anyhow 错误转换为枚举错误，保留完整错误链
    pub fn enumeration(err: &anyhow::Error) -> Self {
        Self::Enumeration(format!("{:#}", err))
    }

    /// 文件名无法无损转换为对象 key
    pub fn non_utf8_name(name: &str) -> Self {
        Self::Upload {
            key: name.to_string(),
            message: "file name is not valid UTF-8".to_string(),
        }
    }

    pub fn upload(key: &str, err: &anyhow::Error) -> Self {
        Self::Upload {
            key: key.to_string(),
            message: format!("{:#}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_error_keeps_key_and_context() {
        let err = anyhow::anyhow!("quota exceeded").context("put object");
        let upload = SyncError::upload("sub/b.txt", &err);
        assert_eq!(
            upload.to_string(),
            "failed to upload sub/b.txt: put object: quota exceeded"
        );
    }
}
