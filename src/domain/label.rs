// ==========================================
// 楼栋层物量引擎 - 层标签值对象
// ==========================================
// 支持的标签形式:
//   B2 / 7F / PH1 / 옥탑1 / 2~14F / 코어2-7F / 코어1-2~14F 기준층
// 核心序号在标签中为 1 起始（코어1 = 第 0 号核心）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

const CORE_PREFIX: &str = "코어";
const PENTHOUSE_DISPLAY_PREFIX: &str = "옥탑";
const STANDARD_SUFFIX: &str = "기준층";

/// 标签所指的层位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloorLevel {
    Basement(u32),
    Ground(u32),
    Penthouse(u32),
    Range { start: u32, end: u32 },
}

/// 解析后的层标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FloorLabel {
    /// 0 起始的核心序号；None 表示未限定核心
    pub core: Option<usize>,
    pub level: FloorLevel,
}

impl FloorLabel {
    pub fn new(core: Option<usize>, level: FloorLevel) -> Self {
        Self { core, level }
    }

    pub fn ground(core: Option<usize>, floor: u32) -> Self {
        Self::new(core, FloorLevel::Ground(floor))
    }

    /// 解析标签，无法识别时返回 None
    pub fn parse(raw: &str) -> Option<Self> {
        let (core, rest) = split_core_qualifier(raw.trim());
        let rest = rest.trim();
        let rest = rest.strip_suffix(STANDARD_SUFFIX).unwrap_or(rest).trim();
        let rest = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or(rest);

        let level = parse_level(rest)?;
        Some(Self { core, level })
    }

    /// 同一核心内的层号（地下为负数，范围取起始层）
    ///
    /// 屋顶层层号需要地上层数，由调用方传入
    pub fn floor_number(&self, ground_count: u32) -> i32 {
        match self.level {
            FloorLevel::Basement(n) => -level_number(n),
            FloorLevel::Ground(n) => level_number(n),
            FloorLevel::Penthouse(k) => level_number(ground_count.saturating_add(k)),
            FloorLevel::Range { start, .. } => level_number(start),
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self.level, FloorLevel::Range { .. })
    }

    /// 范围是否包含给定地上层号
    pub fn range_contains(&self, floor: u32) -> bool {
        match self.level {
            FloorLevel::Range { start, end } => (start..=end).contains(&floor),
            _ => false,
        }
    }

    /// 去除核心限定后的规范标签
    pub fn without_core(&self) -> Self {
        Self {
            core: None,
            level: self.level,
        }
    }

    /// 画面显示用标签（屋顶层显示为 옥탑K）
    pub fn display_label(&self) -> String {
        let body = match self.level {
            FloorLevel::Penthouse(k) => format!("{}{}", PENTHOUSE_DISPLAY_PREFIX, k),
            other => level_to_string(other),
        };
        match self.core {
            Some(core) => format!("{}{}-{}", CORE_PREFIX, core + 1, body),
            None => body,
        }
    }
}

impl fmt::Display for FloorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(core) = self.core {
            write!(f, "{}{}-", CORE_PREFIX, core + 1)?;
        }
        write!(f, "{}", level_to_string(self.level))
    }
}

fn level_to_string(level: FloorLevel) -> String {
    match level {
        FloorLevel::Basement(n) => format!("B{}", n),
        FloorLevel::Ground(n) => format!("{}F", n),
        FloorLevel::Penthouse(k) => format!("PH{}", k),
        FloorLevel::Range { start, end } => format!("{}~{}F", start, end),
    }
}

/// 拆分前缀 "코어N-"，返回 (0 起始核心序号, 剩余部分)
fn split_core_qualifier(raw: &str) -> (Option<usize>, &str) {
    let Some(after) = raw.strip_prefix(CORE_PREFIX) else {
        return (None, raw);
    };
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return (None, raw);
    }
    let Some(rest) = after[digits.len()..].strip_prefix('-') else {
        return (None, raw);
    };
    let core = digits.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
    (core, rest)
}

fn parse_level(body: &str) -> Option<FloorLevel> {
    if body.is_empty() {
        return None;
    }

    if let Some((start, end)) = body.split_once('~') {
        let start = parse_ground_number(start.trim())?;
        let end = parse_ground_number(end.trim())?;
        if start == 0 || end < start {
            return None;
        }
        return Some(FloorLevel::Range { start, end });
    }

    if let Some(rest) = body.strip_prefix("PH") {
        return parse_positive(rest.strip_suffix('F').unwrap_or(rest)).map(FloorLevel::Penthouse);
    }
    if let Some(rest) = body.strip_prefix(PENTHOUSE_DISPLAY_PREFIX) {
        return parse_positive(rest.strip_suffix('층').unwrap_or(rest)).map(FloorLevel::Penthouse);
    }
    if let Some(rest) = body.strip_prefix('B') {
        return parse_positive(rest.strip_suffix('F').unwrap_or(rest)).map(FloorLevel::Basement);
    }
    if let Some(rest) = body.strip_prefix("지하") {
        return parse_positive(rest.strip_suffix('층').unwrap_or(rest)).map(FloorLevel::Basement);
    }

    parse_ground_number(body).map(FloorLevel::Ground)
}

/// "7F" / "7층" / "7"
fn parse_ground_number(s: &str) -> Option<u32> {
    let s = s
        .strip_suffix('F')
        .or_else(|| s.strip_suffix('층'))
        .unwrap_or(s);
    parse_positive(s)
}

fn parse_positive(s: &str) -> Option<u32> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse::<u32>().ok().filter(|n| *n > 0)
}

/// 去除前缀 "코어N-"（无前缀时原样返回）
pub fn strip_core_qualifier(raw: &str) -> &str {
    split_core_qualifier(raw.trim()).1
}

/// 无符号层号转为有符号层号（超出 i32 时饱和）
pub fn level_number(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// 规范化标签：去核心前缀、옥탑K → PHK、去 기준층 后缀
///
/// 无法解析时返回去核心前缀后的原文
pub fn normalize_label(raw: &str) -> String {
    match FloorLabel::parse(raw) {
        Some(label) => label.without_core().to_string(),
        None => strip_core_qualifier(raw).trim().to_string(),
    }
}
