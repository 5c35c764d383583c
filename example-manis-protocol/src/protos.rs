//! Messages of the client protocol.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTableCountRequestProto {
    #[prost(string, tag = "1")]
    pub db_name: String,
    #[prost(string, tag = "2")]
    pub tb_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTableCountResponseProto {
    #[prost(int32, tag = "1")]
    pub result: i32,
}
