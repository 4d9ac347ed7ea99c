/// Implements `IntoFuture` for a pending request, so it can be `.await`ed
/// directly instead of calling `.execute().await`.
///
/// The wrapped `execute` function is emitted as-is. On nightly the future type
/// is named through `impl_trait_in_assoc_type`; on stable it is boxed.
macro_rules! IntoFuture {
    (
        impl $name:ident
        {
            $(#[$meta:meta])*
            pub fn $func:ident ( $($args:tt)* ) -> impl Future<Output = $ret:ty> + $fut_life:lifetime $body:block
        }
    ) => {
        impl $name {
            $(#[$meta])*
            pub fn $func($($args)*) -> impl ::std::future::Future<Output = $ret> + Send + $fut_life $body
        }

        #[cfg(nightly_rust)]
        impl ::std::future::IntoFuture for $name {
            type Output = $ret;
            type IntoFuture = impl ::std::future::Future<Output = Self::Output> + Send + $fut_life;

            fn into_future(self) -> Self::IntoFuture {
                self.$func()
            }
        }

        #[cfg(not(nightly_rust))]
        impl ::std::future::IntoFuture for $name {
            type Output = $ret;
            type IntoFuture = ::std::pin::Pin<Box<dyn ::std::future::Future<Output = Self::Output> + Send + $fut_life>>;

            fn into_future(self) -> Self::IntoFuture {
                Box::pin(self.$func())
            }
        }
    };
}
