mod support;

use std::net::TcpListener;
use std::time::Duration;

use mint_policy::{MintingPolicy, PolicyConfiguration, RejectReason, ValidatorTemplate};
use support::{TestNode, TOKEN};
use wallet::{
    build_burn_tx, build_mint_tx, burn_and_submit, mint_and_submit, submit, BuildError, ChainProvider,
    HttpChainProvider, MintRequest, Network, ProviderError, RootSecret, SubmitError, Value,
    WalletKeys, WalletState,
};

struct Admin {
    keys: WalletKeys,
    policy: MintingPolicy,
}

impl Admin {
    fn new(seed: u8) -> Self {
        let keys = RootSecret::from_bytes([seed; 32]).derive();
        let config = PolicyConfiguration::new(keys.key_hash(), "CO2 Tonne").unwrap();
        let policy = MintingPolicy::instantiate(&ValidatorTemplate::compile(), config).unwrap();
        Self { keys, policy }
    }

    fn state(&self) -> WalletState<'_> {
        WalletState {
            address: self.keys.address(Network::Testnet),
            signer: &self.keys,
            policy: &self.policy,
            collateral: None,
        }
    }
}

fn provider(node: &TestNode) -> HttpChainProvider {
    HttpChainProvider::new(node.url(), Some(TOKEN.into()), Duration::from_secs(10)).unwrap()
}

#[test]
fn mint_and_burn_over_http() {
    let node = TestNode::spawn();
    let admin = Admin::new(1);
    let address = admin.keys.address(Network::Testnet);
    node.ledger().fund(address, Value::coin(50_000_000)).unwrap();
    let provider = provider(&node);

    let utxos = provider.find_utxos(&address).unwrap();
    assert_eq!(utxos.len(), 1);
    assert_eq!(provider.fetch_protocol_params().unwrap(), *node.ledger().params());

    let tx_id = mint_and_submit(&MintRequest::new(1000), &admin.state(), &provider).unwrap();
    assert!(node.ledger().is_applied(&tx_id).unwrap());
    let policy = admin.policy.policy_id();
    let name = admin.policy.config().token_name.clone();
    assert_eq!(node.ledger().balance_of(&address, &policy, &name).unwrap(), 1000);

    burn_and_submit(&MintRequest::new(-1000), &admin.state(), &provider).unwrap();
    assert_eq!(node.ledger().balance_of(&address, &policy, &name).unwrap(), 0);
}

#[test]
fn script_rejection_crosses_the_wire() {
    let node = TestNode::spawn();
    let keys = RootSecret::from_bytes([2u8; 32]).derive();
    let deployed = PolicyConfiguration::new(keys.key_hash(), "CO2 Tonne").unwrap();
    let (_, program) = mint_policy::instantiate(&ValidatorTemplate::compile(), &deployed).unwrap();
    let claimed = PolicyConfiguration::new(keys.key_hash(), "Extra").unwrap();
    let admin = Admin {
        policy: MintingPolicy::from_deployed(claimed, program),
        keys,
    };
    node.ledger()
        .fund(admin.keys.address(Network::Testnet), Value::coin(50_000_000))
        .unwrap();

    let err = build_mint_tx(&MintRequest::new(5), &admin.state(), &provider(&node)).unwrap_err();
    assert!(
        matches!(err, BuildError::ScriptRejected(RejectReason::TokenNameMismatch)),
        "{err:?}"
    );
}

#[test]
fn burning_unheld_tokens_is_a_balancing_error() {
    let node = TestNode::spawn();
    let admin = Admin::new(3);
    node.ledger()
        .fund(admin.keys.address(Network::Testnet), Value::coin(50_000_000))
        .unwrap();
    let err = build_burn_tx(&MintRequest::new(5), &admin.state(), &provider(&node)).unwrap_err();
    assert!(matches!(err, BuildError::Balancing(_)), "{err:?}");
}

#[test]
fn stale_draft_is_rejected_after_double_spend() {
    let node = TestNode::spawn();
    let admin = Admin::new(4);
    node.ledger()
        .fund(admin.keys.address(Network::Testnet), Value::coin(50_000_000))
        .unwrap();
    let provider = provider(&node);

    let first = build_mint_tx(&MintRequest::new(1), &admin.state(), &provider).unwrap();
    let second = build_mint_tx(&MintRequest::new(1), &admin.state(), &provider).unwrap();
    let id = submit(&provider, &first).unwrap();
    assert_eq!(submit(&provider, &first).unwrap(), id);

    let err = submit(&provider, &second).unwrap_err();
    assert!(matches!(err, SubmitError::Rejected(ref message) if message.contains("spent")));
    assert!(!err.is_retryable_with_same_bytes());
}

#[test]
fn missing_auth_token_is_rejected() {
    let node = TestNode::spawn();
    let provider = HttpChainProvider::new(node.url(), None, Duration::from_secs(10)).unwrap();
    let err = provider.fetch_protocol_params().unwrap_err();
    assert!(matches!(err, ProviderError::Rejected(ref message) if message.contains("auth")));
}

#[test]
fn closed_port_is_unreachable() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = url::Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
    let provider = HttpChainProvider::new(url, None, Duration::from_secs(2)).unwrap();
    let admin = Admin::new(5);

    let err = provider.fetch_protocol_params().unwrap_err();
    assert!(matches!(err, ProviderError::Unreachable(_)), "{err:?}");

    let err = build_mint_tx(&MintRequest::new(1), &admin.state(), &provider).unwrap_err();
    assert!(matches!(err, BuildError::Provider(ProviderError::Unreachable(_))));
}

#[test]
fn slow_provider_times_out_as_unreachable() {
    let node = TestNode::spawn();
    let admin = Admin::new(6);
    let address = admin.keys.address(Network::Testnet);
    node.ledger().fund(address, Value::coin(50_000_000)).unwrap();
    let tx = build_mint_tx(&MintRequest::new(1), &admin.state(), &provider(&node)).unwrap();

    node.set_delay(Duration::from_secs(2));
    let impatient =
        HttpChainProvider::new(node.url(), Some(TOKEN.into()), Duration::from_millis(200)).unwrap();
    let err = submit(&impatient, &tx).unwrap_err();
    assert!(matches!(err, SubmitError::Unreachable(_)), "{err:?}");
    assert!(err.is_retryable_with_same_bytes());

    // The same signed bytes can be sent again once the provider responds.
    node.set_delay(Duration::ZERO);
    let id = submit(&provider(&node), &tx).unwrap();
    assert_eq!(id, tx.id());
}
