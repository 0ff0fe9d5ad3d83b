// 图片存储抽象层模块

pub mod azblob;
pub mod factory;
pub mod local;
pub mod traits;

pub use traits::Storage;

/// 由上传文件名生成对象键
///
/// 只保留文件名部分并替换不安全字符；文件名缺失时使用随机UUID。
pub fn blob_key_for(filename: Option<&str>) -> String {
    let name = filename
        .map(|f| f.rsplit(['/', '\\']).next().unwrap_or(f))
        .map(|f| {
            f.chars()
                .map(|c| match c {
                    'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
                    _ => '_',
                })
                .collect::<String>()
        })
        .map(|f| f.trim_start_matches('.').to_string())
        .unwrap_or_default();

    if name.is_empty() || name.chars().all(|c| c == '_') {
        format!("{}.bin", uuid::Uuid::new_v4())
    } else {
        name
    }
}

/// 根据对象键推断内容类型
pub fn content_type_for(key: &str) -> Option<&'static str> {
    mime_guess::from_path(key).first_raw()
}
