mod passkey_store;

pub(crate) use passkey_store::PasskeyStore;
