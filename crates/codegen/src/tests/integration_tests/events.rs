use crate::tests::helpers::Deployed;
use alloy_primitives::{Address, B256, U256, keccak256};
use test_utils::DEFAULT_CALLER;
use vyc_data::{AbiValue, encode_params};

const TOKEN: &str = r#"
event Transfer:
    sender: indexed(address)
    receiver: indexed(address)
    amount: uint256

event Memo:
    topic: indexed(String[16])
    note: String[32]

@external
def send(to: address, amount: uint256):
    log Transfer(msg.sender, to, amount)

@external
def memo(topic: String[16], note: String[32]):
    log Memo(topic, note)
"#;

#[test]
fn indexed_fields_are_topics() {
    let mut token = Deployed::new(TOKEN);
    let receiver = Address::repeat_byte(0x11);
    let args = [AbiValue::Address(receiver), AbiValue::uint(77)];
    token.call("send(address,uint256)", &args).unwrap();

    let logs = token.chain.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].address, token.address);
    let topics = logs[0].data.topics();
    assert_eq!(topics[0], keccak256("Transfer(address,address,uint256)"));
    assert_eq!(topics[1], DEFAULT_CALLER.into_word());
    assert_eq!(topics[2], receiver.into_word());
    assert_eq!(logs[0].data.data.as_ref(), B256::from(U256::from(77)).as_slice());
}

#[test]
fn byte_array_topics_are_hashed() {
    let mut token = Deployed::new(TOKEN);
    let args = [AbiValue::String("greeting".into()), AbiValue::String("hello there".into())];
    token.call("memo(string,string)", &args).unwrap();

    let logs = token.chain.logs();
    let topics = logs[0].data.topics();
    assert_eq!(topics[0], keccak256("Memo(string,string)"));
    assert_eq!(topics[1], keccak256("greeting"));
    let data = encode_params(&[AbiValue::String("hello there".into())]);
    assert_eq!(logs[0].data.data.as_ref(), data.as_slice());
}
