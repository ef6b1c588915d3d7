use hickory_proto::rr::RecordType;

pub trait HostsSource: Send + Sync {
    /// Returns a record in text form, `"<name> <ttl> IN <A|AAAA> <ip>"`, when
    /// the source knows `domain` for `record_type`.
    fn gen_record(&self, domain: &str, record_type: RecordType) -> Option<String>;
}
