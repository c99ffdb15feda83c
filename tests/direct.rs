// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::runtime::Runtime;
    use tokio_util::sync::CancellationToken;

    use wsrpc_lib::test_env::*;
    use wsrpc_lib::{
        AgentConfig, CallError, CallRequest, CallStrategy, ConnectionConfig, PerformCall,
    };

    #[test]
    fn echo() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let server = TestRpcServer::start(RpcReply::Echo, false).await;

            let connection = ConnectionConfig::new(&server.address(), None, None, None).unwrap();
            let strategy = CallStrategy::select(connection, AgentConfig::default());
            assert!(!strategy.is_delegated());

            let request = CallRequest::new("echo", Some(r#"["hi"]"#)).unwrap();
            let result = strategy
                .execute(&request, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(result.get(), r#""hi""#);

            let session = server.finish().await;
            assert_eq!(session.method, "echo");
            assert_eq!(session.params, json!(["hi"]));
            assert_eq!(session.authorization, None);
            assert!(session.closed);
        });
    }

    #[test]
    fn no_params_sends_empty_array() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let server = TestRpcServer::start(RpcReply::Result(json!({"ok": true})), false).await;

            let connection = ConnectionConfig::new(&server.address(), None, None, None).unwrap();
            let strategy = CallStrategy::select(connection, AgentConfig::default());
            let request = CallRequest::new("status", None).unwrap();
            let result = strategy
                .execute(&request, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(
                serde_json::from_str::<serde_json::Value>(result.get()).unwrap(),
                json!({"ok": true})
            );

            let session = server.finish().await;
            assert_eq!(session.params, json!([]));
        });
    }

    #[test]
    fn basic_auth_header() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let server = TestRpcServer::start(RpcReply::Echo, false).await;

            let connection =
                ConnectionConfig::new(&server.address(), None, Some("alice"), Some("hunter2"))
                    .unwrap();
            let strategy = CallStrategy::select(connection, AgentConfig::default());
            let request = CallRequest::new("echo", Some("[1]")).unwrap();
            strategy
                .execute(&request, &CancellationToken::new())
                .await
                .unwrap();

            let session = server.finish().await;
            // base64("alice:hunter2")
            assert_eq!(
                session.authorization.as_deref(),
                Some("Basic YWxpY2U6aHVudGVyMg==")
            );
        });
    }

    #[test]
    fn remote_error_is_surfaced() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let reply = RpcReply::Error {
                code: -32601,
                message: "method not found".to_string(),
            };
            let server = TestRpcServer::start(reply, false).await;

            let connection = ConnectionConfig::new(&server.address(), None, None, None).unwrap();
            let strategy = CallStrategy::select(connection, AgentConfig::default());
            let request = CallRequest::new("nosuch", None).unwrap();
            let res = strategy.execute(&request, &CancellationToken::new()).await;

            match res {
                Err(CallError::Remote(msg)) => assert_eq!(msg, "method not found"),
                other => panic!("unexpected outcome: {other:?}"),
            }
            assert!(server.finish().await.closed);
        });
    }

    #[test]
    fn tls_with_custom_root() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let server = TestRpcServer::start(RpcReply::Echo, true).await;

            let ca = test_path("fixtures/ca.crt");
            let connection =
                ConnectionConfig::new(&server.address(), Some(ca.as_path()), None, None).unwrap();
            let strategy = CallStrategy::select(connection, AgentConfig::default());
            let request = CallRequest::new("echo", Some(r#"[{"nested": [1, 2]}]"#)).unwrap();
            let result = strategy
                .execute(&request, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(
                serde_json::from_str::<serde_json::Value>(result.get()).unwrap(),
                json!({"nested": [1, 2]})
            );

            assert!(server.finish().await.closed);
        });
    }

    #[test]
    fn cancel_closes_session() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let server = TestRpcServer::start(RpcReply::Silent, false).await;

            let connection = ConnectionConfig::new(&server.address(), None, None, None).unwrap();
            let strategy = CallStrategy::select(connection, AgentConfig::default());
            let request = CallRequest::new("wait", Some("[30]")).unwrap();

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                trigger.cancel();
            });

            let res = strategy.execute(&request, &cancel).await;
            assert!(matches!(res, Err(CallError::Cancelled)), "{res:?}");

            let session = server.finish().await;
            assert_eq!(session.method, "wait");
            assert!(session.closed);
        });
    }

    #[test]
    fn nothing_listening() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let port = listener.local_addr().unwrap().port();
            drop(listener);

            let address = format!("ws://127.0.0.1:{port}/rpc");
            let connection = ConnectionConfig::new(&address, None, None, None).unwrap();
            let strategy = CallStrategy::select(connection, AgentConfig::default());
            let request = CallRequest::new("echo", None).unwrap();
            let res = strategy.execute(&request, &CancellationToken::new()).await;
            assert!(matches!(res, Err(CallError::Transport(_))), "{res:?}");
        });
    }
}
