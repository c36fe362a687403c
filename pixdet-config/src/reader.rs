use std::collections::HashMap;
use std::fs;
use std::path::Path;

use glam::{DVec2, DVec3, UVec2};
use toml::{Table, Value};
use toml_edit::{DocumentMut, Item};

use crate::ConfigError;

const GLOBAL_SECTION_LABEL: &str = "<global>";

/// 可从配置值读取的类型。`SCHEMA` 用于报错时描述期望的形态。
pub trait FromConfigValue: Sized {
    const SCHEMA: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float(v) => Some(*v),
        Value::Integer(v) => Some(*v as f64),
        _ => None,
    }
}

fn as_unsigned(value: &Value) -> Option<u32> {
    match value {
        Value::Integer(v) => u32::try_from(*v).ok(),
        _ => None,
    }
}

fn fixed_array<const N: usize>(value: &Value) -> Option<&[Value]> {
    match value {
        Value::Array(items) if items.len() == N => Some(items.as_slice()),
        _ => None,
    }
}

impl FromConfigValue for f64 {
    const SCHEMA: &'static str = "数值";

    fn from_value(value: &Value) -> Option<Self> {
        as_float(value)
    }
}

impl FromConfigValue for u32 {
    const SCHEMA: &'static str = "无符号整数";

    fn from_value(value: &Value) -> Option<Self> {
        as_unsigned(value)
    }
}

impl FromConfigValue for bool {
    const SCHEMA: &'static str = "布尔值";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromConfigValue for String {
    const SCHEMA: &'static str = "字符串";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromConfigValue for UVec2 {
    const SCHEMA: &'static str = "无符号整数对";

    fn from_value(value: &Value) -> Option<Self> {
        let items = fixed_array::<2>(value)?;
        Some(UVec2::new(as_unsigned(&items[0])?, as_unsigned(&items[1])?))
    }
}

impl FromConfigValue for DVec2 {
    const SCHEMA: &'static str = "二维向量";

    fn from_value(value: &Value) -> Option<Self> {
        let items = fixed_array::<2>(value)?;
        Some(DVec2::new(as_float(&items[0])?, as_float(&items[1])?))
    }
}

impl FromConfigValue for DVec3 {
    const SCHEMA: &'static str = "三维向量";

    fn from_value(value: &Value) -> Option<Self> {
        let items = fixed_array::<3>(value)?;
        Some(DVec3::new(
            as_float(&items[0])?,
            as_float(&items[1])?,
            as_float(&items[2])?,
        ))
    }
}

/// 一个配置段。名称为空表示全局（未命名）段。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    name: String,
    values: Table,
}

impl Configuration {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Table::new(),
        }
    }

    #[inline]
    pub fn global() -> Self {
        Self::default()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.name.is_empty()
    }

    /// 便于日志与错误输出的段名。
    pub fn label(&self) -> String {
        if self.is_global() {
            GLOBAL_SECTION_LABEL.to_string()
        } else {
            format!("[{}]", self.name)
        }
    }

    #[inline]
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 读取必填键；缺失返回 `MissingKey`，形态不符返回 `SchemaMismatch`。
    pub fn get<T: FromConfigValue>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.values.get(key).ok_or_else(|| ConfigError::MissingKey {
            section: self.label(),
            key: key.to_string(),
        })?;
        self.convert(key, value)
    }

    /// 读取可选键；缺失时返回默认值，但存在且形态不符时仍然报错。
    pub fn get_or<T: FromConfigValue>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.values.get(key) {
            Some(value) => self.convert(key, value),
            None => Ok(default),
        }
    }

    fn convert<T: FromConfigValue>(&self, key: &str, value: &Value) -> Result<T, ConfigError> {
        T::from_value(value).ok_or_else(|| ConfigError::SchemaMismatch {
            section: self.label(),
            key: key.to_string(),
            expected: T::SCHEMA,
        })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// 链式设置，便于在测试与构建器中组装配置段。
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// 合并另一段配置，冲突时以 `other` 为准。段名保持不变。
    pub fn merge(&mut self, other: &Configuration) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }
}

/// 按声明顺序保存的配置段集合。
#[derive(Debug, Clone, Default)]
pub struct ConfigReader {
    sections: Vec<Configuration>,
}

impl ConfigReader {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sections(sections: impl IntoIterator<Item = Configuration>) -> Self {
        Self {
            sections: sections.into_iter().collect(),
        }
    }

    /// 从 TOML 文本构建：顶层键组成全局段，`[[name]]` 数组表按顺序展开为同名重复段，
    /// 其余 `[name]` 表各自成为命名段。
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut reader = Self::new();
        reader.add_toml_str(content)?;
        Ok(reader)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: Table = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = Self::new();
        reader.add_table(table, &section_positions(&content));
        Ok(reader)
    }

    pub fn add_toml_str(&mut self, content: &str) -> Result<(), ConfigError> {
        let table: Table =
            toml::from_str(content).map_err(|source| ConfigError::Syntax { source })?;
        self.add_table(table, &section_positions(content));
        Ok(())
    }

    /// 命名段按其表头在文档中出现的位置排列；内联表没有表头，排在最前。
    fn add_table(&mut self, table: Table, positions: &HashMap<String, Vec<usize>>) {
        let mut header = Configuration::global();
        let mut named = Vec::new();
        let position_of = |key: &str, index: usize| {
            positions
                .get(key)
                .and_then(|found| found.get(index))
                .copied()
                .unwrap_or(0)
        };

        for (key, value) in table {
            match value {
                Value::Table(values) => {
                    named.push((position_of(&key, 0), Configuration { name: key, values }));
                }
                Value::Array(items)
                    if !items.is_empty() && items.iter().all(Value::is_table) =>
                {
                    for (index, item) in items.into_iter().enumerate() {
                        if let Value::Table(values) = item {
                            let section = Configuration {
                                name: key.clone(),
                                values,
                            };
                            named.push((position_of(&key, index), section));
                        }
                    }
                }
                other => {
                    header.values.insert(key, other);
                }
            }
        }

        named.sort_by_key(|(position, _)| *position);
        self.sections.push(header);
        self.sections.extend(named.into_iter().map(|(_, section)| section));
    }

    #[inline]
    pub fn add(&mut self, section: Configuration) {
        self.sections.push(section);
    }

    /// 头部配置：第一个未命名段；不存在时返回空的全局段。
    pub fn header_configuration(&self) -> Configuration {
        self.sections
            .iter()
            .find(|section| section.is_global())
            .cloned()
            .unwrap_or_default()
    }

    /// 所有名称匹配（忽略大小写）的段，保持声明顺序。
    pub fn configurations_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Configuration> + 'a {
        self.sections
            .iter()
            .filter(move |section| section.name.eq_ignore_ascii_case(name))
    }

    #[inline]
    pub fn configurations(&self) -> &[Configuration] {
        &self.sections
    }
}

/// 顶层表与数组表各元素在文档中的声明位置，按键名索引。
fn section_positions(content: &str) -> HashMap<String, Vec<usize>> {
    let Ok(document) = content.parse::<DocumentMut>() else {
        return HashMap::new();
    };
    document
        .iter()
        .filter_map(|(key, item)| {
            let positions = match item {
                Item::Table(table) => vec![table.position().unwrap_or(usize::MAX)],
                Item::ArrayOfTables(tables) => tables
                    .iter()
                    .map(|table| table.position().unwrap_or(usize::MAX))
                    .collect(),
                _ => return None,
            };
            Some((key.to_string(), positions))
        })
        .collect()
}
