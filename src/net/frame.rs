//! 线路报文（帧）
//!
//! 所有节点共享的报文格式：公共头部（src/dst/seq/ack/priority/长度）加上
//! 一个按 kind 封闭枚举的载荷。每种 kind 的必选字段就是对应变体的结构体
//! 字段，"缺少必选属性"在类型层面不可表达。

use super::addr::Addr;
use crate::sim::SimTime;

/// 默认帧长（字节）。
pub const DEFAULT_FRAME_BYTES: u64 = 1000;

/// 报文优先级，数值越大越优先。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_u8(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
            Priority::Critical => 3,
        }
    }
}

/// 一帧：头部 + kind 载荷。
#[derive(Debug, Clone)]
pub struct Frame {
    pub src: Addr,
    pub dst: Addr,
    pub seq: u64,
    pub ack: u64,
    pub priority: Priority,
    pub byte_length: u64,
    pub kind: Kind,
}

impl Frame {
    /// 构造一帧：seq=0、ack=0、priority=Normal、长度取默认值。
    pub fn new(src: Addr, dst: Addr, kind: Kind) -> Frame {
        Frame {
            src,
            dst,
            seq: 0,
            ack: 0,
            priority: Priority::Normal,
            byte_length: DEFAULT_FRAME_BYTES,
            kind,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Frame {
        self.priority = priority;
        self
    }
}

// ---------- kind 专属字段 ----------

/// 查询/请求走的传输方式（原报文里的 `protocol` 属性）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProto {
    Tcp,
    Udp,
}

#[derive(Debug, Clone)]
pub struct SynFields {
    pub cookie: u64,
}

#[derive(Debug, Clone)]
pub struct SynAckFields {
    pub cookie: u64,
}

#[derive(Debug, Clone)]
pub struct KeyExchangeFields {
    pub public_key: String,
}

#[derive(Debug, Clone)]
pub struct EncryptedFields {
    pub enc_data: String,
}

#[derive(Debug, Clone)]
pub struct DnsQueryFields {
    /// 查询名；已加密时为其十六进制密文。
    pub qname: String,
    pub proto: WireProto,
    pub encrypted: bool,
}

#[derive(Debug, Clone)]
pub struct DnsResponseFields {
    pub qname: String,
    pub answer: Addr,
    pub encrypted: bool,
}

#[derive(Debug, Clone)]
pub struct HttpGetFields {
    pub path: String,
    pub encrypted: bool,
}

#[derive(Debug, Clone)]
pub struct HttpResponseFields {
    pub bytes: u64,
    /// 有共享密钥时响应附带的密文载荷。
    pub enc_data: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MailRequestFields {
    pub encrypted: bool,
}

#[derive(Debug, Clone)]
pub struct MailResponseFields {
    pub bytes: u64,
    pub enc_data: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VideoChunkFields {
    pub bytes: u64,
    pub index: u64,
}

#[derive(Debug, Clone)]
pub struct DbQueryFields {
    pub query: String,
    pub encrypted: bool,
}

#[derive(Debug, Clone)]
pub struct DbResponseFields {
    pub bytes: u64,
    pub result: String,
    pub transaction_id: u64,
    pub encrypted: bool,
}

/// 链路状态通告的内容。`neighbor` 是链路对端路由器，用于重建拓扑图；
/// `timestamp` 按 (origin, link) 单调递增，旧时间戳的记录被忽略。
#[derive(Debug, Clone)]
pub struct LsaFields {
    pub link_id: u32,
    pub cost: f64,
    pub bandwidth: f64,
    pub delay: f64,
    pub neighbor: Addr,
    pub timestamp: SimTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RipRoute {
    pub dest: Addr,
    pub metric: f64,
    pub hops: u32,
}

#[derive(Debug, Clone)]
pub struct RipUpdateFields {
    pub routes: Vec<RipRoute>,
}

/// TCP 数据段 / UDP 数据报承载的应用层报文。
#[derive(Debug, Clone)]
pub enum AppData {
    DnsQuery(DnsQueryFields),
    DnsResponse(DnsResponseFields),
    HttpGet(HttpGetFields),
    HttpResponse(HttpResponseFields),
    MailRequest(MailRequestFields),
    MailResponse(MailResponseFields),
    DbQuery(DbQueryFields),
    DbResponse(DbResponseFields),
}

/// 报文 kind 的封闭枚举。整数标签沿用线路格式编号，见 [`Kind::tag`]。
#[derive(Debug, Clone)]
pub enum Kind {
    DnsQuery(DnsQueryFields),
    DnsResponse(DnsResponseFields),
    HttpGet(HttpGetFields),
    HttpResponse(HttpResponseFields),
    Syn(SynFields),
    SynAck(SynAckFields),
    Ack,
    /// TCP 可靠数据段，内含一个应用层报文。
    Data(AppData),
    Fin,
    /// UDP 数据报，内含一个应用层报文。
    UdpData(AppData),
    KeyExchange(KeyExchangeFields),
    EncryptedData(EncryptedFields),
    Hello,
    Lsa(LsaFields),
    TeUpdate(LsaFields),
    RipUpdate(RipUpdateFields),
    RipRequest,
    MailRequest(MailRequestFields),
    MailResponse(MailResponseFields),
    VideoRequest,
    VideoChunk(VideoChunkFields),
    DbQuery(DbQueryFields),
    DbResponse(DbResponseFields),
}

impl Kind {
    /// 线路格式的整数标签。
    pub fn tag(&self) -> u8 {
        match self {
            Kind::DnsQuery(_) => 10,
            Kind::DnsResponse(_) => 11,
            Kind::HttpGet(_) => 20,
            Kind::HttpResponse(_) => 21,
            Kind::Syn(_) => 30,
            Kind::SynAck(_) => 31,
            Kind::Ack => 32,
            Kind::Data(_) => 33,
            Kind::Fin => 34,
            Kind::UdpData(_) => 40,
            Kind::KeyExchange(_) => 50,
            Kind::EncryptedData(_) => 51,
            Kind::Hello => 60,
            Kind::Lsa(_) => 61,
            Kind::TeUpdate(_) => 62,
            Kind::RipUpdate(_) => 63,
            Kind::RipRequest => 64,
            Kind::MailRequest(_) => 80,
            Kind::MailResponse(_) => 81,
            Kind::VideoRequest => 82,
            Kind::VideoChunk(_) => 83,
            Kind::DbQuery(_) => 84,
            Kind::DbResponse(_) => 85,
        }
    }

    /// 日志用短名。
    pub fn name(&self) -> &'static str {
        match self {
            Kind::DnsQuery(_) => "dns_query",
            Kind::DnsResponse(_) => "dns_response",
            Kind::HttpGet(_) => "http_get",
            Kind::HttpResponse(_) => "http_response",
            Kind::Syn(_) => "tcp_syn",
            Kind::SynAck(_) => "tcp_syn_ack",
            Kind::Ack => "tcp_ack",
            Kind::Data(_) => "tcp_data",
            Kind::Fin => "tcp_fin",
            Kind::UdpData(_) => "udp_data",
            Kind::KeyExchange(_) => "key_exchange",
            Kind::EncryptedData(_) => "encrypted_data",
            Kind::Hello => "ospf_hello",
            Kind::Lsa(_) => "ospf_lsa",
            Kind::TeUpdate(_) => "ospf_te_update",
            Kind::RipUpdate(_) => "rip_update",
            Kind::RipRequest => "rip_request",
            Kind::MailRequest(_) => "mail_request",
            Kind::MailResponse(_) => "mail_response",
            Kind::VideoRequest => "video_request",
            Kind::VideoChunk(_) => "video_chunk",
            Kind::DbQuery(_) => "db_query",
            Kind::DbResponse(_) => "db_response",
        }
    }

    /// 是否属于路由控制平面（转发平面直接交给控制逻辑处理）。
    pub fn is_routing_control(&self) -> bool {
        matches!(
            self,
            Kind::Hello | Kind::Lsa(_) | Kind::TeUpdate(_) | Kind::RipUpdate(_) | Kind::RipRequest
        )
    }
}
