// 该文件是 Liuguang （流光） 项目的一部分。
// src/lib.rs - 库主文件
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::collections::HashMap;

pub mod control;
pub mod dispatch;
pub mod frame;
pub mod input;
pub mod model;
pub mod output;
pub mod schedule;
pub mod task;
pub mod transport;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 将 URL 查询参数展开为键值表，重复的键以最后一次出现为准
pub(crate) fn query_map(url: &url::Url) -> HashMap<String, String> {
  url
    .query_pairs()
    .map(|(k, v)| (String::from(k), String::from(v)))
    .collect()
}

/// 解析布尔型查询参数，仅出现键名（如 `?loop`）视为真
pub(crate) fn query_flag(query: &HashMap<String, String>, key: &str) -> Option<bool> {
  query.get(key).map(|v| {
    !matches!(
      v.to_ascii_lowercase().as_str(),
      "0" | "false" | "no" | "off"
    )
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn query_flag_treats_bare_key_as_true() {
    let url = url::Url::parse("folder:///tmp/frames?loop&fps=25").unwrap();
    let query = query_map(&url);
    assert_eq!(query_flag(&query, "loop"), Some(true));
    assert_eq!(query_flag(&query, "missing"), None);
    assert_eq!(query.get("fps").map(String::as_str), Some("25"));
  }

  #[test]
  fn query_flag_recognises_negative_values() {
    for value in ["0", "false", "No", "OFF"] {
      let url = url::Url::parse(&format!("folder:///tmp/frames?loop={}", value)).unwrap();
      assert_eq!(query_flag(&query_map(&url), "loop"), Some(false), "{}", value);
    }
  }
}
