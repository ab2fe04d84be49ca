//! 封禁键类型
//!
//! 单个IP地址与CIDR子网两种封禁键，以及子网包含关系判断。

use crate::constants::{MAX_IPV4_PREFIX, MAX_IPV6_PREFIX};
use crate::error::BanManError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// CIDR子网
///
/// 构造时会清除主机位，因此 `10.1.2.3/8` 与 `10.0.0.0/8` 是同一个子网。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    network: IpAddr,
    prefix: u8,
}

impl Subnet {
    /// 创建子网
    ///
    /// # 参数
    /// - `addr`: 网络地址（主机位会被清除）
    /// - `prefix`: 前缀长度
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, BanManError> {
        let network = match addr {
            IpAddr::V4(ipv4) => {
                if prefix > MAX_IPV4_PREFIX {
                    return Err(BanManError::ValidationError(format!(
                        "IPv4前缀不能超过32: {}",
                        prefix
                    )));
                }
                IpAddr::V4(Ipv4Addr::from(u32::from(ipv4) & ipv4_mask(prefix)))
            }
            IpAddr::V6(ipv6) => {
                if prefix > MAX_IPV6_PREFIX {
                    return Err(BanManError::ValidationError(format!(
                        "IPv6前缀不能超过128: {}",
                        prefix
                    )));
                }
                IpAddr::V6(Ipv6Addr::from(u128::from(ipv6) & ipv6_mask(prefix)))
            }
        };

        Ok(Self { network, prefix })
    }

    /// 只包含一个地址的子网
    pub fn single(addr: IpAddr) -> Self {
        let prefix = match addr {
            IpAddr::V4(_) => MAX_IPV4_PREFIX,
            IpAddr::V6(_) => MAX_IPV6_PREFIX,
        };
        Self {
            network: addr,
            prefix,
        }
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// 如果子网只包含一个地址，返回该地址
    pub fn single_addr(&self) -> Option<IpAddr> {
        let full = match self.network {
            IpAddr::V4(_) => MAX_IPV4_PREFIX,
            IpAddr::V6(_) => MAX_IPV6_PREFIX,
        };
        (self.prefix == full).then_some(self.network)
    }

    /// 检查IP是否在子网内（地址族必须一致）
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(network), IpAddr::V4(ipv4)) => {
                let mask = ipv4_mask(self.prefix);
                (u32::from(*ipv4) & mask) == u32::from(network)
            }
            (IpAddr::V6(network), IpAddr::V6(ipv6)) => {
                let mask = ipv6_mask(self.prefix);
                (u128::from(*ipv6) & mask) == u128::from(network)
            }
            _ => false,
        }
    }
}

fn ipv4_mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn ipv6_mask(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl From<IpAddr> for Subnet {
    fn from(addr: IpAddr) -> Self {
        Subnet::single(addr)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Subnet {
    type Err = BanManError;

    /// 从字符串解析子网，支持 `addr` 与 `addr/prefix` 两种格式
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((addr, prefix)) => {
                let addr: IpAddr = addr.trim().parse().map_err(|_| {
                    BanManError::ValidationError(format!("无效的IP地址: {}", addr))
                })?;
                let prefix: u8 = prefix.trim().parse().map_err(|_| {
                    BanManError::ValidationError(format!("无效的前缀: {}", prefix))
                })?;
                Subnet::new(addr, prefix)
            }
            None => {
                let addr: IpAddr = s.trim().parse().map_err(|_| {
                    BanManError::ValidationError(format!("无效的IP地址: {}", s))
                })?;
                Ok(Subnet::single(addr))
            }
        }
    }
}

/// 封禁键
///
/// 单地址子网总是被规范化为 [`BanKey::Address`]，保证同一个地址不会同时
/// 出现在两张映射表中。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BanKey {
    /// 单个地址
    Address(IpAddr),
    /// 包含多个地址的子网
    Subnet(Subnet),
}

impl BanKey {
    /// 转换为子网表示
    pub fn as_subnet(&self) -> Subnet {
        match self {
            BanKey::Address(addr) => Subnet::single(*addr),
            BanKey::Subnet(subnet) => *subnet,
        }
    }

    pub fn is_single_addr(&self) -> bool {
        matches!(self, BanKey::Address(_))
    }
}

impl From<IpAddr> for BanKey {
    fn from(addr: IpAddr) -> Self {
        BanKey::Address(addr)
    }
}

impl From<Subnet> for BanKey {
    fn from(subnet: Subnet) -> Self {
        match subnet.single_addr() {
            Some(addr) => BanKey::Address(addr),
            None => BanKey::Subnet(subnet),
        }
    }
}

impl fmt::Display for BanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BanKey::Address(addr) => write!(f, "{}", addr),
            BanKey::Subnet(subnet) => write!(f, "{}", subnet),
        }
    }
}

impl FromStr for BanKey {
    type Err = BanManError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(BanKey::from(s.parse::<Subnet>()?))
    }
}

impl TryFrom<String> for BanKey {
    type Error = BanManError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BanKey> for String {
    fn from(key: BanKey) -> Self {
        key.to_string()
    }
}
