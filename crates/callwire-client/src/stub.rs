//! Typed client stubs.

/// Declare a typed client for a remote service.
///
/// Generates a struct wrapping a [`ServiceProxy`](crate::ServiceProxy) with
/// one async method per declared signature. Argument types must implement
/// `ToRpcValue` and return types `FromRpcValue`.
///
/// ```rust,ignore
/// client_stub! {
///     pub struct EchoClient for "Echo" {
///         async fn say(text: String) -> String;
///         async fn shout(text: String, times: Option<u32>) -> String;
///     }
/// }
///
/// let echo = EchoClient::new(&client);
/// assert_eq!(echo.say("hi".to_string()).await?, "hi");
/// ```
#[macro_export]
macro_rules! client_stub {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident for $service:literal {
            $( async fn $method:ident ( $( $arg:ident : $arg_ty:ty ),* $(,)? ) -> $ret:ty; )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            service: $crate::ServiceProxy,
        }

        impl $name {
            pub fn new(client: &$crate::RpcClient) -> Self {
                Self {
                    service: client.service($service),
                }
            }

            $(
                pub async fn $method(&self, $( $arg: $arg_ty ),*) -> ::std::result::Result<$ret, $crate::CallError> {
                    self.service
                        .method(stringify!($method))
                        .call_as::<$ret, _>(( $( $arg, )* ))
                        .await
                }
            )*
        }
    };
}
