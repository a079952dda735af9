//! # Scope 模块
//!
//! 当前线程的活跃管理器栈。
//!
//! 组件树在挂载根节点时 `enter()`，子组件通过 [`use_motion`] 取得最近的管理器；
//! 守卫析构时出栈。栈里只存弱引用，不延长管理器的生命周期。

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::{MotionError, MotionResult};
use crate::lifecycle::MotionManager;

thread_local! {
    static ACTIVE: RefCell<Vec<Weak<MotionManager>>> = const { RefCell::new(Vec::new()) };
}

/// 作用域守卫，析构时移除对应的栈项
#[must_use = "守卫被丢弃时作用域立即结束"]
#[derive(Debug)]
pub struct ScopeGuard {
    manager: Weak<MotionManager>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        ACTIVE.with(|stack| {
            let mut stack = stack.borrow_mut();
            // 守卫可能不按嵌套顺序析构，从栈顶找第一个匹配项
            if let Some(pos) = stack.iter().rposition(|entry| entry.ptr_eq(&self.manager)) {
                stack.remove(pos);
            }
        });
    }
}

impl MotionManager {
    /// 把自己压入当前线程的作用域栈
    pub fn enter(self: &Rc<Self>) -> ScopeGuard {
        let manager = Rc::downgrade(self);
        ACTIVE.with(|stack| stack.borrow_mut().push(manager.clone()));
        ScopeGuard { manager }
    }
}

/// 最近进入且仍然存活的管理器
pub fn current() -> MotionResult<Rc<MotionManager>> {
    ACTIVE.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find_map(|entry| entry.upgrade().filter(|manager| !manager.is_torn_down()))
            .ok_or(MotionError::NoActiveScope)
    })
}

/// 取得当前作用域的管理器
///
/// # Panics
/// 不在任何作用域内时 panic，这是组件树接线错误。
pub fn use_motion() -> Rc<MotionManager> {
    match current() {
        Ok(manager) => manager,
        Err(e) => panic!("{e}"),
    }
}
