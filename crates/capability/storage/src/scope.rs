//! 可见性范围与分页
//!
//! 非管理员用户的每次查询都必须携带 [`AccessScope`]：由该用户全部未删除的
//! COM 分配汇总而来。比较一律做 trim + 大写归一化。
//!
//! 规则：
//! - 可见性：device_id ∈ 分配设备集 且 com_port ∈ 分配端口并集
//!   （仅端口匹配而设备不在分配内的行不可见，反之亦然）
//! - 任一集合为空 ⇒ 查询结果为空页
//! - 管理员可见全部，include_deleted=true 时含软删除行

use crate::models::ComAllocationRecord;
use std::collections::HashSet;

/// 归一化比较键：去首尾空白后整体大写。
pub fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

/// 查询可见性范围。
#[derive(Debug, Clone)]
pub enum AccessScope {
    /// 管理员：全量可见。
    Admin { include_deleted: bool },
    /// 普通用户：限定在分配范围内（集合内为归一化值）。
    Allocated {
        device_ids: HashSet<String>,
        com_ports: HashSet<String>,
    },
}

impl AccessScope {
    /// 管理员范围。
    pub fn admin(include_deleted: bool) -> Self {
        AccessScope::Admin { include_deleted }
    }

    /// 由用户的未删除分配构造范围。
    pub fn from_allocations(allocations: &[ComAllocationRecord]) -> Self {
        let mut device_ids = HashSet::new();
        let mut com_ports = HashSet::new();
        for allocation in allocations {
            if allocation.is_deleted {
                continue;
            }
            let device_id = normalize(&allocation.device_id);
            if !device_id.is_empty() {
                device_ids.insert(device_id);
            }
            for port in &allocation.com_ports {
                let port = normalize(port);
                if !port.is_empty() {
                    com_ports.insert(port);
                }
            }
        }
        AccessScope::Allocated {
            device_ids,
            com_ports,
        }
    }

    /// 任一集合为空即整体为空（对应空页返回）。
    pub fn is_empty(&self) -> bool {
        match self {
            AccessScope::Admin { .. } => false,
            AccessScope::Allocated {
                device_ids,
                com_ports,
            } => device_ids.is_empty() || com_ports.is_empty(),
        }
    }

    pub fn include_deleted(&self) -> bool {
        matches!(
            self,
            AccessScope::Admin {
                include_deleted: true
            }
        )
    }

    /// 行是否可见：设备与端口须同时落在分配范围内。
    pub fn allows(&self, device_id: &str, com_port: &str) -> bool {
        match self {
            AccessScope::Admin { .. } => true,
            AccessScope::Allocated {
                device_ids,
                com_ports,
            } => {
                device_ids.contains(&normalize(device_id)) && com_ports.contains(&normalize(com_port))
            }
        }
    }
}

/// 分页请求。pageNumber 从 1 起，pageSize 截断到 [1, 200]。
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page_number: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page_number: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page_number: page_number.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(20).clamp(1, 200),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page_number - 1) * self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// 分页结果。
#[derive(Debug)]
pub struct Page<T> {
    pub total_count: i64,
    pub page_number: i64,
    pub page_size: i64,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    /// 空页（分配为空时直接返回，不触达存储）。
    pub fn empty(page: PageRequest) -> Self {
        Self {
            total_count: 0,
            page_number: page.page_number,
            page_size: page.page_size,
            data: Vec::new(),
        }
    }
}

/// 短信列表查询条件（可见性之外的过滤，全部可选）。
#[derive(Debug, Clone, Default)]
pub struct SmsMessageQuery {
    pub device_id: Option<String>,
    pub com_port: Option<String>,
    pub sender_contains: Option<String>,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// 挂断记录列表查询条件。
#[derive(Debug, Clone, Default)]
pub struct CallHangupQuery {
    pub device_id: Option<String>,
    pub com_port: Option<String>,
    pub caller_contains: Option<String>,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn allocation(device_id: &str, ports: &[&str]) -> ComAllocationRecord {
        ComAllocationRecord {
            id: "a-1".to_string(),
            user_id: "u-1".to_string(),
            device_id: device_id.to_string(),
            com_ports: ports.iter().map(|port| port.to_string()).collect(),
            is_deleted: false,
            create_time: Utc::now(),
            update_time: Utc::now(),
        }
    }

    #[test]
    fn normalization_is_case_and_space_insensitive() {
        let scope = AccessScope::from_allocations(&[allocation("d1", &[" com3 ", "COM5"])]);
        assert!(scope.allows("D1", "com3"));
        assert!(scope.allows(" d1 ", "Com5 "));
        assert!(!scope.allows("D1", "COM4"));
        assert!(!scope.allows("D2", "COM3"));
    }

    #[test]
    fn deleted_allocations_do_not_grant_access() {
        let mut deleted = allocation("D1", &["COM3"]);
        deleted.is_deleted = true;
        let scope = AccessScope::from_allocations(&[deleted]);
        assert!(scope.is_empty());
    }

    #[test]
    fn page_request_clamps() {
        let page = PageRequest::new(Some(0), Some(1000));
        assert_eq!(page.page_number, 1);
        assert_eq!(page.page_size, 200);
        let page = PageRequest::new(Some(3), Some(0));
        assert_eq!(page.page_size, 1);
        assert_eq!(page.offset(), 2);
    }
}
